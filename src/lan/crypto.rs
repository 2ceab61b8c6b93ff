use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{LanError, RekeyReason};
use crate::util::{decode_b64, encode_b64};

pub const BLOCK_SIZE: usize = 16;

type HmacSha256 = Hmac<Sha256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub type Iv = [u8; BLOCK_SIZE];

fn mac(key: &[u8]) -> Result<HmacSha256, LanError> {
    HmacSha256::new_from_slice(key).map_err(|_| LanError::InvalidKey("hmac key"))
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], LanError> {
    let mut mac = mac(key)?;
    mac.update(data);
    let mut out = [0; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Appends zeros up to the next block boundary. Input already on a boundary gains a full
/// block of zeros.
pub fn pad_zero(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    padded.resize(data.len() + BLOCK_SIZE - data.len() % BLOCK_SIZE, 0);
    padded
}

/// Truncates at the first zero byte. Plaintext containing a zero byte is therefore cut short;
/// input without one is returned unchanged.
pub fn unpad_zero(data: &[u8]) -> &[u8] {
    match data.iter().position(|b| *b == 0) {
        Some(end) => &data[..end],
        None => data,
    }
}

/// AES-256-CBC over the zero-padded plaintext, base64 encoded.
pub fn aes_encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<String, LanError> {
    let mut buffer = pad_zero(plaintext);
    let len = buffer.len();
    Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|_| LanError::InvalidKey("aes key or iv"))?
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| LanError::NeedsRekey(RekeyReason::CipherLength))?;
    Ok(encode_b64(&buffer))
}

/// Decrypts base64 ciphertext and strips the zero padding.
pub fn aes_decrypt(ciphertext: &str, key: &[u8], iv: &[u8]) -> Result<Vec<u8>, LanError> {
    let mut buffer = decode_b64(ciphertext)?;
    let plaintext = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| LanError::InvalidKey("aes key or iv"))?
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| LanError::NeedsRekey(RekeyReason::CipherLength))?;
    Ok(unpad_zero(plaintext).to_vec())
}

/// The IV for the next message in the same direction: the last block of this ciphertext.
pub fn next_iv(ciphertext: &[u8]) -> Result<Iv, LanError> {
    if ciphertext.len() < BLOCK_SIZE || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(LanError::NeedsRekey(RekeyReason::CipherLength));
    }
    let mut iv = [0; BLOCK_SIZE];
    iv.copy_from_slice(&ciphertext[ciphertext.len() - BLOCK_SIZE..]);
    Ok(iv)
}

pub fn rotate_iv(ciphertext: &str) -> Result<Iv, LanError> {
    next_iv(&decode_b64(ciphertext)?)
}

/// Base64 HMAC-SHA256 of the plaintext.
pub fn sign(payload: &[u8], key: &[u8]) -> Result<String, LanError> {
    Ok(encode_b64(&hmac_sha256(key, payload)?))
}

pub fn verify(payload: &[u8], signature: &str, key: &[u8]) -> Result<(), LanError> {
    let signature = decode_b64(signature)?;
    let mut mac = mac(key)?;
    mac.update(payload);
    mac.verify_slice(&signature)
        .map_err(|_| LanError::NeedsRekey(RekeyReason::Signature))
}
