//! Named views over monitor frames, driven by a JSON profile of bit flags, enum names and
//! predicates.

use thiserror::Error;

mod profile;
mod view;

pub use profile::*;
pub use view::*;

/// Problems found while loading a [`MonitorProfile`].
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("flag {0}: source must be 'alarms' or 'switches'")]
    InvalidFlagSource(String),
    #[error("{0}: bit must be between 0 and 7")]
    BitOutOfRange(String),
    #[error("{0}: byte must be non-negative")]
    ByteOutOfRange(String),
    #[error("predicate {name}: unsupported kind {kind:?}")]
    UnknownPredicateKind { name: String, kind: String },
    #[error("predicate {name}: unknown source {given:?}")]
    InvalidSource { name: String, given: String },
    #[error("predicate {name}: missing {field}")]
    MissingField { name: String, field: &'static str },
    #[error("predicate {name}: unknown flag {flag:?}")]
    UnknownFlag { name: String, flag: String },
    #[error("enum {name}: code {code:?} is not a byte")]
    InvalidEnumCode { name: String, code: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
