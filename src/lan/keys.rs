use std::time::{SystemTime, UNIX_EPOCH};

use rand::{distributions::Alphanumeric, Rng};

use super::crypto::{hmac_sha256, Iv, BLOCK_SIZE};
use super::payload::KeyExchange;
use super::LanError;
use crate::config::SessionConfig;

const SIGN_KEY: u8 = 0x30;
const CRYPTO_KEY: u8 = 0x31;
const IV_SEED: u8 = 0x32;

const NONCE_LEN: usize = 16;

/// The four nonces exchanged when a session is set up. The app-side pair comes first in every
/// app-direction derivation and second in every device-direction one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyExchangeNonces {
    pub app_random: String,
    pub app_time: String,
    pub device_random: String,
    pub device_time: String,
}

impl KeyExchangeNonces {
    /// Nonces for a key exchange: the announced `random_1`/`time_1` fill the app slot and the
    /// locally generated pair fills the device slot.
    pub fn from_exchange(exchange: &KeyExchange, local: (String, String)) -> Self {
        KeyExchangeNonces {
            app_random: exchange.random_1.clone(),
            app_time: exchange.time_1.to_string(),
            device_random: local.0,
            device_time: local.1,
        }
    }

    /// The same exchange seen from the other side.
    pub fn swapped(&self) -> Self {
        KeyExchangeNonces {
            app_random: self.device_random.clone(),
            app_time: self.device_time.clone(),
            device_random: self.app_random.clone(),
            device_time: self.app_time.clone(),
        }
    }

    fn message(&self, device_direction: bool, discriminator: u8) -> Vec<u8> {
        let (first, second) = if device_direction {
            (self.swapped(), self.clone())
        } else {
            (self.clone(), self.swapped())
        };
        let mut message = Vec::new();
        message.extend_from_slice(first.app_random.as_bytes());
        message.extend_from_slice(second.app_random.as_bytes());
        message.extend_from_slice(first.app_time.as_bytes());
        message.extend_from_slice(second.app_time.as_bytes());
        message.push(discriminator);
        message
    }
}

/// Derived session secrets. There is no device signing key: only the app signs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub app_sign_key: [u8; 32],
    pub app_crypto_key: [u8; 32],
    pub app_iv_seed: Iv,
    pub device_crypto_key: [u8; 32],
    pub device_iv_seed: Iv,
    /// Incremented by the session on every rekey.
    pub epoch: u64,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// `HMAC(lan_key, HMAC(lan_key, message) || message)`
fn derive_secret(lan_key: &[u8], message: &[u8]) -> Result<[u8; 32], LanError> {
    let mut outer = hmac_sha256(lan_key, message)?.to_vec();
    outer.extend_from_slice(message);
    hmac_sha256(lan_key, &outer)
}

fn derive_iv(lan_key: &[u8], message: &[u8]) -> Result<Iv, LanError> {
    let mut iv = [0; BLOCK_SIZE];
    iv.copy_from_slice(&derive_secret(lan_key, message)?[..BLOCK_SIZE]);
    Ok(iv)
}

impl SessionKeys {
    pub fn derive(lan_key: &str, nonces: &KeyExchangeNonces) -> Result<SessionKeys, LanError> {
        let lan_key = lan_key.as_bytes();
        Ok(SessionKeys {
            app_sign_key: derive_secret(lan_key, &nonces.message(false, SIGN_KEY))?,
            app_crypto_key: derive_secret(lan_key, &nonces.message(false, CRYPTO_KEY))?,
            app_iv_seed: derive_iv(lan_key, &nonces.message(false, IV_SEED))?,
            device_crypto_key: derive_secret(lan_key, &nonces.message(true, CRYPTO_KEY))?,
            device_iv_seed: derive_iv(lan_key, &nonces.message(true, IV_SEED))?,
            epoch: 0,
        })
    }
}

/// A fresh local nonce pair: a random alphanumeric string and the current time in
/// milliseconds. The config can pin either value.
pub fn generate_local_nonce(config: &SessionConfig) -> (String, String) {
    let random = config.fixed_random.clone().unwrap_or_else(|| {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect()
    });
    let time = config.fixed_time.clone().unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
            .to_string()
    });
    (random, time)
}
