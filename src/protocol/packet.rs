use crc::Crc;
use std::fmt::Debug;

/// Marker byte that opens every frame the host sends to the machine.
pub const COMMAND_MARKER: u8 = 0x0d;

/// Marker byte that opens recipe and property frames reported by the machine.
pub const D0_MARKER: u8 = 0xd0;

#[derive(Clone, Eq, PartialEq)]
/// A simple byte-based frame, with marker, length and checksum.
pub struct EcamFrame {
    pub(crate) bytes: Vec<u8>,
}

impl Debug for EcamFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hexdump(&self.bytes))
    }
}

impl EcamFrame {
    pub fn from_slice(bytes: &[u8]) -> Self {
        EcamFrame {
            bytes: bytes.into(),
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        EcamFrame { bytes }
    }

    /// Wraps a frame body (opcode and arguments) with marker, length and checksum.
    pub fn packetize(body: &[u8]) -> Self {
        EcamFrame {
            bytes: packetize(body),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn stringify(&self) -> String {
        stringify(&self.bytes)
    }

    /// Whether the trailing two bytes hold the checksum of everything before them.
    pub fn checksum_ok(&self) -> bool {
        checksum_matches(&self.bytes)
    }
}

pub const CRC_ALGO: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_SPI_FUJITSU);

/// Computes the checksum from a partial frame. Note that the checksum used here is
/// equivalent to the `CRC_16_SPI_FUJITSU` definition (initial 0x1d0f, poly 0x1021).
pub fn checksum(buffer: &[u8]) -> [u8; 2] {
    CRC_ALGO.checksum(buffer).to_be_bytes()
}

/// Checks a complete frame whose final two bytes are the checksum.
pub fn checksum_matches(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (body, crc) = frame.split_at(frame.len() - 2);
    checksum(body) == crc
}

/// Returns the contents of the frame, minus marker/length and checksum.
pub fn unwrap_packet<T: ?Sized>(buffer: &T) -> &[u8]
where
    T: AsRef<[u8]>,
{
    let u: &[u8] = buffer.as_ref();
    if u.len() < 4 {
        return &[];
    }
    &u[2..u.len() - 2]
}

/// The length byte counts the whole frame: marker, itself, body and checksum. Bodies too long
/// to be described by a single length byte have their length truncated, as the firmware does.
fn packetize(buffer: &[u8]) -> Vec<u8> {
    let mut out = [&[COMMAND_MARKER, (buffer.len() + 4) as u8], buffer].concat();
    out.extend_from_slice(&checksum(&out));
    out
}

pub fn stringify(buffer: &[u8]) -> String {
    buffer
        .iter()
        .map(|n| format!("{:02x}", n))
        .collect::<String>()
}

/// Dumps a frame to a readable hex form.
pub fn hexdump(buffer: &[u8]) -> String {
    let maybe_space = |i| if i > 0 && i % 8 == 0 { " " } else { "" };
    let s1: String = buffer
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{}{:02x}", maybe_space(i), b))
        .collect::<String>();
    let s2: String = buffer
        .iter()
        .map(|b| {
            if *b >= 32 && *b < 127 {
                *b as char
            } else {
                '.'
            }
        })
        .collect::<String>();
    format!("|{}| |{}|", s1, s2)
}

#[cfg(test)]
pub mod test {
    use super::*;
    use rstest::*;

    pub fn from_hex_str(s: &str) -> Vec<u8> {
        hex::decode(s.replace(' ', "")).unwrap()
    }

    /// Bit-at-a-time reference, kept to prove the table-driven CRC is bit-exact.
    fn reference_crc(data: &[u8]) -> [u8; 2] {
        let mut crc: u16 = 0x1d0f;
        for byte in data {
            crc ^= (*byte as u16) << 8;
            for _ in 0..8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ 0x1021;
                } else {
                    crc <<= 1;
                }
            }
        }
        crc.to_be_bytes()
    }

    #[test]
    pub fn test_checksum() {
        assert_eq!(
            checksum(&from_hex_str("0d 0f 83 f0 02 01 01 00 67 02 02 00 00 06")),
            [0x77, 0xff]
        );
        assert_eq!(
            checksum(&from_hex_str("0d 0d 83 f0 05 01 01 00 78 00 00 06")),
            [0xc4, 0x7e]
        );
        assert_eq!(checksum(&from_hex_str("0d 07 84 0f 02 01")), [0x55, 0x12]);
    }

    #[rstest]
    #[case("")]
    #[case("00")]
    #[case("0d 07 84 0f 02 01")]
    #[case("d0 12 75 0f 02 04 01 00 40 0a 04 00 00 00 00 00 00")]
    #[case("ff ff ff ff ff ff ff ff ff ff ff ff ff ff ff ff ff ff ff ff")]
    fn checksum_matches_bitwise_reference(#[case] input: &str) {
        let data = from_hex_str(input);
        assert_eq!(checksum(&data), reference_crc(&data));
    }

    #[test]
    fn checksum_of_empty_is_initial_value() {
        assert_eq!(checksum(&[]), [0x1d, 0x0f]);
    }

    #[test]
    fn single_bit_flips_change_checksum() {
        let data = from_hex_str("0d 0d 83 f0 05 01 01 00 78 00 00 06");
        let good = checksum(&data);
        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut corrupted = data.clone();
                corrupted[byte] ^= 1 << bit;
                assert_ne!(good, checksum(&corrupted), "flip at {byte}:{bit}");
            }
        }
    }

    #[test]
    pub fn test_packetize() {
        assert_eq!(
            packetize(&from_hex_str("84 0f 02 01")),
            from_hex_str("0d 08 84 0f 02 01")
                .into_iter()
                .chain(checksum(&from_hex_str("0d 08 84 0f 02 01")))
                .collect::<Vec<_>>()
        );
        let frame = packetize(&from_hex_str("75 f0"));
        assert_eq!(frame[1] as usize, frame.len());
        assert!(checksum_matches(&frame));
    }

    #[test]
    fn unwrap_returns_body() {
        let frame = EcamFrame::packetize(&[0x83, 0xf0, 0x01]);
        assert_eq!(unwrap_packet(frame.bytes()), &[0x83, 0xf0, 0x01]);
        assert!(frame.checksum_ok());
        assert_eq!(unwrap_packet(&[0x0d, 0x02]), &[] as &[u8]);
    }

    #[test]
    fn hexdump_format() {
        assert_eq!(hexdump(b"AB\x00"), "|414200| |AB.|");
    }
}
