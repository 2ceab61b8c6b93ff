//! Universal imports for this crate.

pub use std::{sync::Arc, time::Duration};

pub use crate::util::CollectMapJoin;
pub use crate::{info, trace_packet, warning};
