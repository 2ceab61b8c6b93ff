use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A key exchange timestamp. Devices send it either as a string or as a bare integer; both
/// derive keys from the decimal text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NonceTime {
    Text(String),
    Number(u64),
}

impl std::fmt::Display for NonceTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchange {
    pub random_1: String,
    pub time_1: NonceTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchangeRequest {
    pub key_exchange: KeyExchange,
}

/// An encrypted, signed message on the LAN channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub enc: String,
    pub sign: String,
    pub seq: u64,
}

/// The plaintext inside [`EncryptedPayload::enc`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub seq_no: String,
    pub data: Value,
}

impl CommandEnvelope {
    pub fn new(seq: u64, data: Value) -> Self {
        CommandEnvelope {
            seq_no: seq.to_string(),
            data,
        }
    }

    /// Compact JSON, as the device expects it.
    pub fn to_json(&self) -> String {
        // Serializing a struct of strings and a `Value` cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// The keep-alive payload: `{"seq_no":"<seq>","data":{}}`.
pub fn build_empty_payload(seq: u64) -> String {
    CommandEnvelope::new(seq, Value::Object(Default::default())).to_json()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_payload_is_compact() {
        assert_eq!(build_empty_payload(0), r#"{"seq_no":"0","data":{}}"#);
        assert_eq!(build_empty_payload(42), r#"{"seq_no":"42","data":{}}"#);
    }

    #[test]
    fn key_exchange_time_forms() {
        let request: KeyExchangeRequest =
            serde_json::from_value(json!({"key_exchange": {"random_1": "abc", "time_1": 123}}))
                .expect("request");
        assert_eq!(request.key_exchange.time_1.to_string(), "123");
        let exchange: KeyExchange =
            serde_json::from_value(json!({"random_1": "abc", "time_1": "456"})).expect("exchange");
        assert_eq!(exchange.time_1, NonceTime::Text("456".to_owned()));
    }

    #[test]
    fn envelope_shape() {
        let envelope = CommandEnvelope::new(7, json!({"properties": [1]}));
        assert_eq!(envelope.to_json(), r#"{"seq_no":"7","data":{"properties":[1]}}"#);
        let payload: EncryptedPayload =
            serde_json::from_str(r#"{"enc":"AA==","sign":"BB==","seq":3}"#).expect("payload");
        assert_eq!(payload.seq, 3);
    }
}
