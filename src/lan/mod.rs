//! Encrypted local-network channel: key derivation, AES-CBC payload crypto with chained IVs,
//! and the session that owns the key material.

use thiserror::Error;

mod crypto;
mod keys;
mod payload;
mod rekey;
mod session;

pub use crypto::*;
pub use keys::{generate_local_nonce, KeyExchangeNonces, SessionKeys};
pub use payload::*;
pub use rekey::RekeyTimer;
pub use session::{LanSession, SessionState};

/// Why the channel can no longer be trusted and a new key exchange is needed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RekeyReason {
    /// Ciphertext is not a whole number of AES blocks.
    CipherLength,
    /// HMAC signature did not match.
    Signature,
    /// Decrypted plaintext is not a readable message, so the peer used other keys.
    Decrypt,
    /// The message was prepared against keys that have since been replaced.
    StaleEpoch,
    Expired,
    Uninitialized,
}

impl std::fmt::Display for RekeyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CipherLength => "ciphertext length is not a multiple of the block size",
            Self::Signature => "signature mismatch",
            Self::Decrypt => "decrypted payload is unreadable",
            Self::StaleEpoch => "key epoch changed",
            Self::Expired => "session expired",
            Self::Uninitialized => "no session keys",
        })
    }
}

#[derive(Error, Debug)]
pub enum LanError {
    #[error("needs rekey: {0}")]
    NeedsRekey(RekeyReason),
    #[error("invalid base64: {0}")]
    Base64(String),
    #[error("invalid key material: {0}")]
    InvalidKey(&'static str),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LanError {
    /// True for every failure that should trigger a new key exchange rather than a retry.
    pub fn needs_rekey(&self) -> bool {
        matches!(self, LanError::NeedsRekey(_))
    }
}

impl From<base64::DecodeError> for LanError {
    fn from(e: base64::DecodeError) -> Self {
        LanError::Base64(e.to_string())
    }
}
