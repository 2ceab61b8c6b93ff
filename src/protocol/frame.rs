use crate::prelude::*;

use super::hardware_enums::EcamRequestId;
use super::machine_enum::MachineEnum;
use super::packet::{checksum, hexdump, stringify, D0_MARKER};
use crate::util::decode_b64_lenient;

/// A `0xd0` frame as reported by the machine: `[0xd0][length][opcode hi][opcode lo][payload...][crc]`.
///
/// These frames are decoded leniently. The checksum is verified but a mismatch only clears
/// [`D0Frame::crc_ok`]; the cloud metadata channel does not always carry a correct one.
#[derive(Clone, Eq, PartialEq)]
pub struct D0Frame {
    pub length: u8,
    pub opcode: u16,
    pub payload: Vec<u8>,
    pub crc_ok: bool,
    pub raw: Vec<u8>,
}

impl std::fmt::Debug for D0Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("D0Frame")
            .field("opcode", &format_args!("{:04x}", self.opcode))
            .field("payload", &hexdump(&self.payload))
            .field("crc_ok", &self.crc_ok)
            .finish()
    }
}

impl D0Frame {
    /// Decodes a frame, returning `None` only when the marker is wrong or fewer than six bytes
    /// are present. The frame ends at `length + 1` or the end of the buffer, whichever is first.
    pub fn decode(raw: &[u8]) -> Option<D0Frame> {
        if raw.len() < 6 || raw[0] != D0_MARKER {
            return None;
        }
        let length = raw[1];
        let frame_end = (length as usize + 1).min(raw.len());
        // A declared length under 2 leaves no room for a checksum; the frame still decodes.
        let crc_start = frame_end.saturating_sub(2);
        let opcode = u16::from_be_bytes([raw[2], raw[3]]);
        let payload = raw.get(4..crc_start).unwrap_or_default().to_vec();
        let crc_ok =
            frame_end - crc_start == 2 && checksum(&raw[..crc_start]) == raw[crc_start..frame_end];
        if !crc_ok {
            trace_packet!("d0 frame {:04x} has a bad checksum: {}", opcode, stringify(raw));
        }
        Some(D0Frame {
            length,
            opcode,
            payload,
            crc_ok,
            raw: raw.to_vec(),
        })
    }

    pub fn from_b64(b64: &str) -> Option<D0Frame> {
        Self::decode(&decode_b64_lenient(b64)?)
    }

    /// The request this frame answers, from the high byte of the opcode.
    pub fn request_id(&self) -> MachineEnum<EcamRequestId> {
        MachineEnum::decode((self.opcode >> 8) as u8)
    }

    pub fn raw_hex(&self) -> String {
        stringify(&self.raw)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::test::*;

    #[test]
    fn decodes_brew_acknowledgement() {
        let frame = D0Frame::decode(&RESPONSE_BREW_RECEIVED).expect("frame");
        assert_eq!(frame.opcode, 0x83f0);
        assert_eq!(frame.payload, vec![0x01, 0x00]);
        assert!(frame.crc_ok);
        assert_eq!(frame.request_id(), MachineEnum::Value(EcamRequestId::BeverageDispensingMode));
    }

    #[test]
    fn bad_checksum_is_reported_not_rejected() {
        let mut raw = RESPONSE_BREW_RECEIVED.to_vec();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let frame = D0Frame::decode(&raw).expect("frame");
        assert!(!frame.crc_ok);
        assert_eq!(frame.payload, vec![0x01, 0x00]);
    }

    #[test]
    fn rejects_wrong_marker_and_short_input() {
        assert_eq!(D0Frame::decode(&from_hex_str("0d 07 83 f0 01 00 64 d9")), None);
        assert_eq!(D0Frame::decode(&[0xd0, 0x01]), None);
        assert_eq!(D0Frame::from_b64("not base64!!"), None);
    }

    #[test]
    fn declared_length_past_buffer_is_clamped() {
        let frame = D0Frame::decode(&from_hex_str("d0 40 95 f0 02 00 00")).expect("frame");
        assert_eq!(frame.payload, vec![0x02]);
        assert!(!frame.crc_ok);
    }

    #[test]
    fn zero_length_still_decodes() {
        let frame = D0Frame::decode(&from_hex_str("d0 00 a6 f0 01 02 03 04")).expect("frame");
        assert_eq!(frame.length, 0);
        assert_eq!(frame.opcode, 0xa6f0);
        assert!(frame.payload.is_empty());
        assert!(!frame.crc_ok);
    }

    #[test]
    fn tiny_length_yields_empty_payload() {
        let frame = D0Frame::decode(&from_hex_str("d0 02 95 f0 02 00 00")).expect("frame");
        assert!(frame.payload.is_empty());
        assert!(!frame.crc_ok);
    }
}
