use std::time::{Duration, SystemTime};

use serde_json::{json, Value};

use super::packet::{checksum, stringify};
use super::FrameError;
use crate::util::decode_b64_lenient;

/// A decoded monitor (status) frame.
///
/// Layout: `[direction][length][request id][answer required][13 content bytes][crc][timestamp][extra]`.
/// The length byte excludes the direction marker, so the checksum sits at `[length - 1..length + 1]`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MonitorFrame {
    pub direction: u8,
    pub request_id: u8,
    pub answer_required: u8,
    pub accessory: u8,
    pub switches: [u8; 2],
    /// Alarm bytes. The frame splits them: two sit before the status byte, two after progress.
    pub alarms: [u8; 4],
    pub status: u8,
    pub action: u8,
    pub progress: u8,
    pub timestamp: Vec<u8>,
    pub extra: Vec<u8>,
    pub raw: Vec<u8>,
}

const CONTENTS_LEN: usize = 13;

impl MonitorFrame {
    /// Strictly decodes a monitor frame. Any structural problem is an error; there is no partial
    /// result.
    pub fn decode(raw: &[u8]) -> Result<MonitorFrame, FrameError> {
        if raw.len() < 4 {
            return Err(FrameError::TooShort(raw.len()));
        }
        let direction = raw[0];
        let length = raw[1] as usize;
        if length < 4 || raw.len() < length + 1 {
            return Err(FrameError::LengthMismatch {
                declared: length,
                actual: raw.len(),
            });
        }
        let expected = checksum(&raw[..length - 1]);
        let actual = [raw[length - 1], raw[length]];
        if expected != actual {
            return Err(FrameError::ChecksumMismatch {
                expected: u16::from_be_bytes(expected),
                actual: u16::from_be_bytes(actual),
            });
        }

        let data = &raw[2..length - 1];
        let trailer = &raw[length + 1..];
        let (timestamp, extra) = trailer.split_at(trailer.len().min(4));

        if data.len() < 2 {
            return Err(FrameError::PayloadTooShort);
        }
        let contents = &data[2..];
        if contents.len() != CONTENTS_LEN {
            return Err(FrameError::ContentsLength(contents.len()));
        }

        Ok(MonitorFrame {
            direction,
            request_id: data[0],
            answer_required: data[1],
            accessory: contents[0],
            switches: [contents[1], contents[2]],
            alarms: [contents[3], contents[4], contents[8], contents[9]],
            status: contents[5],
            action: contents[6],
            progress: contents[7],
            timestamp: timestamp.to_vec(),
            extra: extra.to_vec(),
            raw: raw.to_vec(),
        })
    }

    pub fn from_b64(b64: &str) -> Result<MonitorFrame, FrameError> {
        let raw = decode_b64_lenient(b64).ok_or_else(|| FrameError::Base64(b64.to_owned()))?;
        Self::decode(&raw)
    }

    /// The decoded fields as a JSON object, with byte strings rendered as hex.
    pub fn to_json(&self) -> Value {
        json!({
            "direction": self.direction,
            "request_id": self.request_id,
            "answer_required": self.answer_required,
            "accessory": self.accessory,
            "switches": self.switches,
            "alarms": self.alarms,
            "status": self.status,
            "action": self.action,
            "progress": self.progress,
            "timestamp": stringify(&self.timestamp),
            "extra": stringify(&self.extra),
        })
    }
}

/// A monitor reading together with its decode diagnostics.
///
/// Decoding never fails here: parse problems are collected in `errors` and the raw byte count
/// is kept so callers still have something to report.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorSnapshot {
    pub raw: Vec<u8>,
    pub raw_b64: String,
    pub received_at: SystemTime,
    pub frame: Option<MonitorFrame>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub source: String,
    pub device_id: Option<String>,
}

impl MonitorSnapshot {
    pub fn from_b64(raw_b64: &str, source: &str, device_id: Option<String>) -> MonitorSnapshot {
        let mut snapshot = MonitorSnapshot {
            raw: vec![],
            raw_b64: raw_b64.to_owned(),
            received_at: SystemTime::now(),
            frame: None,
            warnings: vec![],
            errors: vec![],
            source: source.to_owned(),
            device_id,
        };
        let Some(raw) = decode_b64_lenient(raw_b64) else {
            snapshot
                .errors
                .push(format!("parse_failed: {}", FrameError::Base64(raw_b64.to_owned())));
            return snapshot;
        };
        match MonitorFrame::decode(&raw) {
            Ok(frame) => snapshot.frame = Some(frame),
            Err(e) => {
                crate::warning!("monitor frame rejected: {}", e);
                snapshot.errors.push(format!("parse_failed: {}", e));
            }
        }
        snapshot.raw = raw;
        snapshot
    }

    /// Builds a snapshot from a monitor payload, accepting either `monitor_b64` or the
    /// property shape `monitor.data.value`. `received_at` is read as Unix seconds when present.
    pub fn from_payload(payload: &Value, source: &str, device_id: Option<String>) -> MonitorSnapshot {
        let raw_b64 = payload
            .get("monitor_b64")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| payload.pointer("/monitor/data/value").and_then(Value::as_str))
            .filter(|s| !s.is_empty());
        let received_at = payload
            .get("received_at")
            .and_then(Value::as_f64)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs_f64(secs));

        let mut snapshot = match raw_b64 {
            Some(raw_b64) => Self::from_b64(raw_b64, source, device_id),
            None => MonitorSnapshot {
                raw: vec![],
                raw_b64: String::new(),
                received_at: SystemTime::now(),
                frame: None,
                warnings: vec!["no monitor_b64 in payload".to_owned()],
                errors: vec![],
                source: source.to_owned(),
                device_id,
            },
        };
        if let Some(received_at) = received_at {
            snapshot.received_at = received_at;
        }
        snapshot
    }

    /// Decoded fields, or only `raw_length` when the frame could not be decoded.
    pub fn parsed(&self) -> Value {
        match &self.frame {
            Some(frame) => frame.to_json(),
            None if !self.raw.is_empty() => json!({ "raw_length": self.raw.len() }),
            None => json!({}),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::test::*;
    use crate::util::encode_b64;
    use rstest::*;

    #[test]
    fn decodes_cappuccino_milk_status() {
        let frame = MonitorFrame::decode(&RESPONSE_STATUS_CAPPUCINO_MILK).expect("frame");
        assert_eq!(frame.direction, 0xd0);
        assert_eq!(frame.request_id, 0x75);
        assert_eq!(frame.answer_required, 0x0f);
        assert_eq!(frame.accessory, 0x02);
        assert_eq!(frame.switches, [0x04, 0x01]);
        assert_eq!(frame.alarms, [0x00, 0x40, 0x00, 0x00]);
        assert_eq!(frame.status, 0x0a);
        assert_eq!(frame.action, 0x04);
        assert_eq!(frame.progress, 0x00);
        assert!(frame.timestamp.is_empty());
        assert!(frame.extra.is_empty());
    }

    #[test]
    fn decodes_cleaning_status() {
        let frame = MonitorFrame::decode(&RESPONSE_STATUS_CLEANING_AFTER_CAPPUCINO).expect("frame");
        assert_eq!(frame.accessory, 0x04);
        assert_eq!(frame.switches, [0x05, 0x01]);
        assert_eq!(frame.status, 0x0c);
        assert_eq!(frame.action, 0x03);
        assert_eq!(frame.progress, 0x09);
    }

    #[test]
    fn trailing_timestamp_and_extra() {
        let mut raw = RESPONSE_STATUS_READY_AFTER_CAPPUCINO.to_vec();
        raw.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0xee, 0xff]);
        let frame = MonitorFrame::decode(&raw).expect("frame");
        assert_eq!(frame.timestamp, vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(frame.extra, vec![0xee, 0xff]);

        let mut raw = RESPONSE_STATUS_READY_AFTER_CAPPUCINO.to_vec();
        raw.extend_from_slice(&[0x01, 0x02]);
        let frame = MonitorFrame::decode(&raw).expect("frame");
        assert_eq!(frame.timestamp, vec![0x01, 0x02]);
        assert!(frame.extra.is_empty());
    }

    #[rstest]
    #[case(&[0xd0, 0x12, 0x75], FrameError::TooShort(3))]
    #[case(&[0xd0, 0x12, 0x75, 0x0f, 0x00], FrameError::LengthMismatch { declared: 0x12, actual: 5 })]
    #[case(&[0xd0, 0x03, 0x75, 0x0f, 0x00], FrameError::LengthMismatch { declared: 3, actual: 5 })]
    fn structural_errors(#[case] raw: &[u8], #[case] expected: FrameError) {
        assert_eq!(MonitorFrame::decode(raw), Err(expected));
    }

    #[test]
    fn declared_length_longer_than_buffer() {
        let raw = &RESPONSE_STATUS_CAPPUCINO_MILK[..RESPONSE_STATUS_CAPPUCINO_MILK.len() - 1];
        assert!(matches!(
            MonitorFrame::decode(raw),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn corrupted_checksum() {
        let mut raw = RESPONSE_STATUS_CAPPUCINO_MILK.to_vec();
        raw[5] ^= 0x01;
        assert!(matches!(
            MonitorFrame::decode(&raw),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn wrong_contents_length() {
        let mut body = vec![0xd0, 0x00, 0x75, 0x0f, 0x01, 0x02, 0x03];
        body[1] = (body.len() + 1) as u8;
        body.extend_from_slice(&checksum(&body));
        assert_eq!(MonitorFrame::decode(&body), Err(FrameError::ContentsLength(3)));
    }

    #[test]
    fn snapshot_from_payload() {
        let b64 = encode_b64(&RESPONSE_STATUS_CAPPUCINO_MILK);
        let snapshot = MonitorSnapshot::from_payload(
            &json!({ "monitor": { "data": { "value": b64 } }, "received_at": 1700000000.5 }),
            "local",
            Some("AC000W000000001".to_owned()),
        );
        assert!(snapshot.errors.is_empty());
        assert_eq!(snapshot.frame.as_ref().map(|f| f.status), Some(0x0a));
        assert_eq!(snapshot.parsed()["status"], json!(10));
        assert_eq!(
            snapshot.received_at,
            SystemTime::UNIX_EPOCH + Duration::from_secs_f64(1700000000.5)
        );
    }

    #[test]
    fn snapshot_reports_raw_length_on_failure() {
        let mut raw = RESPONSE_STATUS_CAPPUCINO_MILK.to_vec();
        raw[3] ^= 0xff;
        let snapshot = MonitorSnapshot::from_b64(&encode_b64(&raw), "cloud", None);
        assert!(snapshot.frame.is_none());
        assert_eq!(snapshot.errors.len(), 1);
        assert!(snapshot.errors[0].starts_with("parse_failed"));
        assert_eq!(snapshot.parsed(), json!({ "raw_length": 19 }));
    }

    #[test]
    fn snapshot_without_monitor_data() {
        let snapshot = MonitorSnapshot::from_payload(&json!({}), "local", None);
        assert_eq!(snapshot.warnings, vec!["no monitor_b64 in payload".to_owned()]);
        assert!(snapshot.errors.is_empty());
        assert_eq!(snapshot.parsed(), json!({}));
    }
}
