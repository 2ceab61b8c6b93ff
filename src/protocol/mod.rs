//! Frame-level protocol for ECAM-based machines: checksums, parameter TLVs, command building
//! and the decoders for frames the machine reports.

mod codec;
mod command;
mod frame;
mod hardware_enums;
mod machine_enum;
mod monitor;
mod packet;
mod property;
mod recipe;
mod tlv;

pub use codec::*;
pub use command::*;
pub use frame::*;
pub use hardware_enums::*;
pub use machine_enum::*;
pub use monitor::*;
pub use packet::*;
pub use property::*;
pub use recipe::*;
pub use tlv::*;

use thiserror::Error;

/// Reasons a monitor frame is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),
    #[error("declared length {declared} does not fit {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("checksum mismatch (expected {expected:04x}, got {actual:04x})")]
    ChecksumMismatch { expected: u16, actual: u16 },
    #[error("payload too short")]
    PayloadTooShort,
    #[error("unexpected contents length {0}")]
    ContentsLength(usize),
    #[error("invalid base64: {0:?}")]
    Base64(String),
}

#[cfg(test)]
pub mod test {
    use const_decoder::Decoder;

    pub use super::packet::test::from_hex_str;

    /// Packet received when a brew response is sent
    pub const RESPONSE_BREW_RECEIVED: [u8; 8] = Decoder::Hex.decode(b"d00783f0010064d9");
    /// Packet received when pouring Cappucino milk
    pub const RESPONSE_STATUS_CAPPUCINO_MILK: [u8; 19] =
        Decoder::Hex.decode(b"d012750f02040100400a040000000000004183");
    /// Packet received after pouring a Cappucino but before cleaning
    pub const RESPONSE_STATUS_READY_AFTER_CAPPUCINO: [u8; 19] =
        Decoder::Hex.decode(b"d012750f02040100400700000000000000d621");
    /// Packet received during cleaing
    pub const RESPONSE_STATUS_CLEANING_AFTER_CAPPUCINO: [u8; 19] =
        Decoder::Hex.decode(b"d012750f04050100400c030900000000001cf0");
}
