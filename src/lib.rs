//! Talk to ECAM-based coffee machines.
//!
//! `ecamlink` speaks the byte-level ECAM protocol used by DeLonghi machines: it builds brew and
//! stop command frames, decodes the monitor, recipe and property frames the machine reports, and
//! runs the encrypted, signed LAN session that carries those frames over the local network.
//!
//! # Examples
//!
//! Build a brew command:
//! ```text
//! $ ecamlink brew --beverage cappuccino --param coffee_ml=120 --param taste=3
//! 0d0d83f007010100781b033c3a
//! ```
//!
//! Decode a monitor reading with the built-in profile:
//!
//! ```text
//! $ ecamlink decode-monitor 0BJ1DwIEAQBACgQAAAAAAABBgw==
//! milk preparation (motor_down, water_tank_present)
//! ```

pub mod config;
pub mod display;
pub mod lan;
pub mod logging;
pub mod monitor;
mod prelude;
pub mod protocol;
pub mod util;
