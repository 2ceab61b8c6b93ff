use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::time::Instant;

use super::crypto::{self, Iv};
use super::keys::{KeyExchangeNonces, SessionKeys};
use super::payload::{CommandEnvelope, EncryptedPayload};
use super::{LanError, RekeyReason};
use crate::config::SessionConfig;
use crate::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    KeysDerived,
    Active,
    Expired,
}

/// Chained IV for one direction, tagged with the key epoch it was seeded from.
struct IvChain {
    epoch: u64,
    iv: Iv,
}

#[derive(Default)]
struct SessionMeta {
    derived_at: Option<Instant>,
    expired: bool,
    active: bool,
}

#[derive(Copy, Clone)]
enum Direction {
    Outgoing,
    Incoming,
}

/// One encrypted LAN session.
///
/// Keys are replaced as a whole `Arc` snapshot on every rekey. Each direction's IV chain sits
/// behind its own mutex, so messages in one direction are serialised and each advances the
/// chain exactly once. Locks are always taken chain first (outgoing before incoming), then
/// keys, then metadata.
pub struct LanSession {
    lan_key: RwLock<String>,
    config: SessionConfig,
    keys: RwLock<Option<Arc<SessionKeys>>>,
    outgoing: Mutex<IvChain>,
    incoming: Mutex<IvChain>,
    meta: Mutex<SessionMeta>,
    seq: AtomicU64,
    epochs: AtomicU64,
}

impl LanSession {
    pub fn new(lan_key: &str, config: SessionConfig) -> Self {
        LanSession {
            lan_key: RwLock::new(lan_key.to_owned()),
            config,
            keys: RwLock::new(None),
            outgoing: Mutex::new(IvChain { epoch: 0, iv: [0; 16] }),
            incoming: Mutex::new(IvChain { epoch: 0, iv: [0; 16] }),
            meta: Mutex::new(SessionMeta::default()),
            seq: AtomicU64::new(0),
            epochs: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        let keys = self.keys.read();
        if keys.is_none() {
            return SessionState::Uninitialized;
        }
        let meta = self.meta.lock();
        if self.expired(&meta) {
            SessionState::Expired
        } else if meta.active {
            SessionState::Active
        } else {
            SessionState::KeysDerived
        }
    }

    fn expired(&self, meta: &SessionMeta) -> bool {
        meta.expired
            || meta
                .derived_at
                .map_or(false, |at| at.elapsed() >= self.config.rekey_interval())
    }

    pub fn is_expired(&self) -> bool {
        self.state() == SessionState::Expired
    }

    /// Flags the session as needing a new key exchange. Existing keys stay installed but every
    /// crypto operation fails until [`LanSession::rekey`].
    pub fn mark_expired(&self) {
        if self.keys.read().is_some() {
            self.meta.lock().expired = true;
            info!("LAN session marked for rekey");
        }
    }

    /// Derives and installs new keys, resetting both IV chains to the new seeds. Sequence
    /// numbers continue.
    pub fn rekey(&self, nonces: &KeyExchangeNonces) -> Result<Arc<SessionKeys>, LanError> {
        let mut keys = SessionKeys::derive(&self.lan_key.read(), nonces)?;
        keys.epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        let keys = Arc::new(keys);

        let mut outgoing = self.outgoing.lock();
        let mut incoming = self.incoming.lock();
        *outgoing = IvChain {
            epoch: keys.epoch,
            iv: keys.app_iv_seed,
        };
        *incoming = IvChain {
            epoch: keys.epoch,
            iv: keys.device_iv_seed,
        };
        *self.keys.write() = Some(keys.clone());
        *self.meta.lock() = SessionMeta {
            derived_at: Some(Instant::now()),
            ..Default::default()
        };
        info!("LAN session keys derived (epoch {})", keys.epoch);
        Ok(keys)
    }

    /// Replaces the LAN key. The current keys were derived from the old one, so they are
    /// dropped.
    pub fn set_lan_key(&self, lan_key: &str) {
        *self.lan_key.write() = lan_key.to_owned();
        self.invalidate();
    }

    pub fn invalidate(&self) {
        let _outgoing = self.outgoing.lock();
        let _incoming = self.incoming.lock();
        *self.keys.write() = None;
        *self.meta.lock() = SessionMeta::default();
    }

    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// The current keys, provided the session has not expired.
    fn usable_keys(&self) -> Result<Arc<SessionKeys>, LanError> {
        let keys = self
            .keys
            .read()
            .clone()
            .ok_or(LanError::NeedsRekey(RekeyReason::Uninitialized))?;
        if self.expired(&self.meta.lock()) {
            return Err(LanError::NeedsRekey(RekeyReason::Expired));
        }
        Ok(keys)
    }

    /// Runs one message through a direction's chain. The chain only advances when `f`
    /// succeeds, and `f` sees keys from the same epoch as the chain.
    fn with_chain<T>(
        &self,
        direction: Direction,
        f: impl FnOnce(&SessionKeys, &Iv) -> Result<(T, Iv), LanError>,
    ) -> Result<T, LanError> {
        let mut chain = match direction {
            Direction::Outgoing => self.outgoing.lock(),
            Direction::Incoming => self.incoming.lock(),
        };
        let keys = self.usable_keys()?;
        if chain.epoch != keys.epoch {
            warning!(
                "IV chain epoch {} does not match key epoch {}",
                chain.epoch,
                keys.epoch
            );
            return Err(LanError::NeedsRekey(RekeyReason::StaleEpoch));
        }
        let (result, next) = f(&keys, &chain.iv)?;
        chain.iv = next;
        self.meta.lock().active = true;
        Ok(result)
    }

    pub fn encrypt_outgoing(&self, plaintext: &[u8]) -> Result<String, LanError> {
        self.with_chain(Direction::Outgoing, |keys, iv| {
            let enc = crypto::aes_encrypt(plaintext, &keys.app_crypto_key, iv)?;
            let next = crypto::rotate_iv(&enc)?;
            Ok((enc, next))
        })
    }

    pub fn decrypt_incoming(&self, enc: &str) -> Result<Vec<u8>, LanError> {
        self.with_chain(Direction::Incoming, |keys, iv| {
            let plaintext = crypto::aes_decrypt(enc, &keys.device_crypto_key, iv)?;
            let next = crypto::rotate_iv(enc)?;
            trace_packet!("decrypted {}", String::from_utf8_lossy(&plaintext));
            Ok((plaintext, next))
        })
    }

    pub fn sign(&self, plaintext: &[u8]) -> Result<String, LanError> {
        crypto::sign(plaintext, &self.usable_keys()?.app_sign_key)
    }

    /// Wraps `data` in a sequenced envelope, encrypts and signs it. Encryption and signature
    /// always use the same key epoch. The sequence number is only taken once the keys are known
    /// to be usable, so a refused seal leaves no gap.
    pub fn seal_command(&self, data: Value) -> Result<EncryptedPayload, LanError> {
        self.with_chain(Direction::Outgoing, |keys, iv| {
            let seq = self.next_seq();
            let json = CommandEnvelope::new(seq, data).to_json();
            trace_packet!("sealing {}", json);
            let enc = crypto::aes_encrypt(json.as_bytes(), &keys.app_crypto_key, iv)?;
            let sign = crypto::sign(json.as_bytes(), &keys.app_sign_key)?;
            let next = crypto::rotate_iv(&enc)?;
            Ok((EncryptedPayload { enc, sign, seq }, next))
        })
    }

    /// Decrypts a device message and parses its JSON body. Device messages are not signed with
    /// a key the app holds, so `sign` is not checked. CBC decryption under the wrong key still
    /// yields bytes; plaintext that is not JSON is treated as a key mismatch.
    pub fn open_payload(&self, payload: &EncryptedPayload) -> Result<Value, LanError> {
        let plaintext = self.decrypt_incoming(&payload.enc)?;
        serde_json::from_slice(&plaintext).map_err(|e| {
            warning!("undecodable LAN payload (seq {}): {}", payload.seq, e);
            LanError::NeedsRekey(RekeyReason::Decrypt)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lan::{build_empty_payload, verify};
    use serde_json::json;

    const LAN_KEY: &str = "pZ4tLAN0key0for0tests0only000000";

    fn nonces() -> KeyExchangeNonces {
        KeyExchangeNonces {
            app_random: "aaaaaaaaaaaaaaaa".to_owned(),
            app_time: "1000".to_owned(),
            device_random: "bbbbbbbbbbbbbbbb".to_owned(),
            device_time: "2000".to_owned(),
        }
    }

    /// An app session and the matching device-side session.
    fn pair() -> (LanSession, LanSession) {
        let app = LanSession::new(LAN_KEY, SessionConfig::default());
        let device = LanSession::new(LAN_KEY, SessionConfig::default());
        app.rekey(&nonces()).unwrap();
        device.rekey(&nonces().swapped()).unwrap();
        (app, device)
    }

    #[test]
    fn lifecycle() {
        let session = LanSession::new(LAN_KEY, SessionConfig::default());
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(matches!(
            session.encrypt_outgoing(b"x"),
            Err(LanError::NeedsRekey(RekeyReason::Uninitialized))
        ));
        session.rekey(&nonces()).unwrap();
        assert_eq!(session.state(), SessionState::KeysDerived);
        session.encrypt_outgoing(b"x").unwrap();
        assert_eq!(session.state(), SessionState::Active);
        session.mark_expired();
        assert_eq!(session.state(), SessionState::Expired);
        assert!(session.encrypt_outgoing(b"x").unwrap_err().needs_rekey());
        session.rekey(&nonces()).unwrap();
        assert_eq!(session.state(), SessionState::KeysDerived);
        session.invalidate();
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn messages_chain_in_both_directions() {
        let (app, device) = pair();
        for i in 0..5 {
            let message = format!(r#"{{"seq_no":"{}","data":{{}}}}"#, i);
            let enc = device.encrypt_outgoing(message.as_bytes()).unwrap();
            assert_eq!(app.decrypt_incoming(&enc).unwrap(), message.as_bytes());
        }
        let enc = app.encrypt_outgoing(b"hello").unwrap();
        assert_eq!(device.decrypt_incoming(&enc).unwrap(), b"hello");
    }

    #[test]
    fn identical_plaintexts_differ_on_the_wire() {
        let (app, _) = pair();
        let first = app.encrypt_outgoing(b"same").unwrap();
        let second = app.encrypt_outgoing(b"same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn directions_are_independent() {
        let (app, device) = pair();
        // Outgoing traffic must not disturb the incoming chain.
        for _ in 0..3 {
            app.encrypt_outgoing(b"noise").unwrap();
        }
        let enc = device.encrypt_outgoing(b"reply").unwrap();
        assert_eq!(app.decrypt_incoming(&enc).unwrap(), b"reply");
    }

    #[test]
    fn rekey_resets_chains() {
        let (app, device) = pair();
        app.encrypt_outgoing(b"one").unwrap();
        let keys = app.rekey(&nonces()).unwrap();
        assert_eq!(keys.epoch, 2);
        let enc = app.encrypt_outgoing(b"two").unwrap();
        device.rekey(&nonces().swapped()).unwrap();
        assert_eq!(device.decrypt_incoming(&enc).unwrap(), b"two");
    }

    #[test]
    fn seal_and_open() {
        let (app, device) = pair();
        let sealed = app.seal_command(json!({"cmd": "0d07"})).unwrap();
        assert_eq!(sealed.seq, 0);
        let plaintext = device.decrypt_incoming(&sealed.enc).unwrap();
        assert_eq!(plaintext, br#"{"seq_no":"0","data":{"cmd":"0d07"}}"#);
        let sign_key = SessionKeys::derive(LAN_KEY, &nonces()).unwrap().app_sign_key;
        verify(&plaintext, &sealed.sign, &sign_key).unwrap();
        assert_eq!(app.seal_command(json!({})).unwrap().seq, 1);

        let reply = device.encrypt_outgoing(build_empty_payload(9).as_bytes()).unwrap();
        let opened = app
            .open_payload(&EncryptedPayload {
                enc: reply,
                sign: String::new(),
                seq: 9,
            })
            .unwrap();
        assert_eq!(opened, json!({"seq_no": "9", "data": {}}));
    }

    #[test]
    fn wrong_lan_key_is_detected_downstream() {
        let (app, _) = pair();
        let other = LanSession::new("a different lan key", SessionConfig::default());
        other.rekey(&nonces().swapped()).unwrap();
        let enc = other.encrypt_outgoing(br#"{"a":1}"#).unwrap();
        let err = app
            .open_payload(&EncryptedPayload {
                enc,
                sign: String::new(),
                seq: 0,
            })
            .unwrap_err();
        assert!(err.needs_rekey());
        assert!(matches!(err, LanError::NeedsRekey(RekeyReason::Decrypt)));
    }

    #[test]
    fn refused_seal_keeps_sequence() {
        let session = LanSession::new(LAN_KEY, SessionConfig::default());
        assert!(session.seal_command(json!({})).unwrap_err().needs_rekey());
        session.rekey(&nonces()).unwrap();
        assert_eq!(session.seal_command(json!({})).unwrap().seq, 0);
        session.mark_expired();
        assert!(session.seal_command(json!({})).unwrap_err().needs_rekey());
        session.rekey(&nonces()).unwrap();
        assert_eq!(session.seal_command(json!({})).unwrap().seq, 1);
    }

    #[test]
    fn set_lan_key_invalidates() {
        let (app, _) = pair();
        app.set_lan_key("new key");
        assert_eq!(app.state(), SessionState::Uninitialized);
    }

    #[test]
    fn concurrent_senders_each_advance_once() {
        let (app, device) = pair();
        let app = Arc::new(app);
        let sent = Arc::new(Mutex::new(vec![]));
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let app = app.clone();
                let sent = sent.clone();
                std::thread::spawn(move || {
                    for j in 0..4 {
                        let message = format!("{}-{}", i, j);
                        // Hold the record lock so the log matches chain order.
                        let mut sent = sent.lock();
                        let enc = app.encrypt_outgoing(message.as_bytes()).unwrap();
                        sent.push((message, enc));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        let sent = sent.lock();
        assert_eq!(sent.len(), 32);
        for (message, enc) in sent.iter() {
            assert_eq!(device.decrypt_incoming(enc).unwrap(), message.as_bytes());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_interval() {
        let config = SessionConfig {
            rekey_interval: 5.0,
            ..SessionConfig::default()
        };
        let session = LanSession::new(LAN_KEY, config);
        session.rekey(&nonces()).unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!session.is_expired());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(session.is_expired());
        assert!(matches!(
            session.sign(b"x"),
            Err(LanError::NeedsRekey(RekeyReason::Expired))
        ));
    }
}
