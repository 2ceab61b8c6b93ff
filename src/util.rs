use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

pub trait CollectMapJoin<X> {
    /// Utility function to collect an iterator, map it with a function, and join it into a final string.
    fn collect_map_join(self, sep: &str, f: fn(X) -> String) -> String;

    /// Utility function to collect an iterator, map/filter it with a function, and join it into a final string.
    fn collect_filter_map_join(self, sep: &str, f: fn(X) -> Option<String>) -> String;
}

impl<T: Iterator<Item = X>, X> CollectMapJoin<X> for T {
    fn collect_map_join(self, sep: &str, f: fn(X) -> String) -> String {
        // When https://github.com/rust-lang/rust/issues/79524 is fixed, this can probably be simplified
        // self.map(f).intersperse(sep).collect()
        self.map(f).collect::<Vec<String>>().join(sep)
    }

    fn collect_filter_map_join(self, sep: &str, f: fn(X) -> Option<String>) -> String {
        self.filter_map(f).collect::<Vec<String>>().join(sep)
    }
}

pub fn encode_b64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Strict base64 decode, as used on the encrypted LAN channel.
pub fn decode_b64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data)
}

/// Decodes base64 the way cloud property values need it: whitespace is ignored and missing
/// padding is restored. Malformed input is logged and yields `None`.
pub fn decode_b64_lenient(data: &str) -> Option<Vec<u8>> {
    let mut cleaned: String = data.split_whitespace().collect();
    while cleaned.len() % 4 != 0 {
        cleaned.push('=');
    }
    match STANDARD.decode(&cleaned) {
        Ok(raw) => Some(raw),
        Err(e) => {
            crate::warning!("invalid base64 value ({}): {:?}", e, data);
            None
        }
    }
}

/// Tests bit `bit` (0 = least significant) of `byte`. Bits past 7 read as `None`.
pub fn get_bit(byte: u8, bit: u8) -> Option<bool> {
    if bit > 7 {
        return None;
    }
    Some(byte & (1 << bit) != 0)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("0A==", Some(vec![0xd0]))]
    #[case("0A", Some(vec![0xd0]))]
    #[case(" 0Ac\nH ", Some(vec![0xd0, 0x07, 0x07]))]
    #[case("", Some(vec![]))]
    #[case("not-valid-base64!!!", None)]
    fn lenient_decode(#[case] input: &str, #[case] expected: Option<Vec<u8>>) {
        assert_eq!(decode_b64_lenient(input), expected);
    }

    #[test]
    fn bits() {
        assert_eq!(get_bit(0b1000_0001, 0), Some(true));
        assert_eq!(get_bit(0b1000_0001, 1), Some(false));
        assert_eq!(get_bit(0b1000_0001, 7), Some(true));
        assert_eq!(get_bit(0xff, 8), None);
    }

    #[test]
    fn join() {
        assert_eq!([1, 2, 3].iter().collect_map_join(",", |x| x.to_string()), "1,2,3");
        assert_eq!(
            [1, 2, 3]
                .iter()
                .collect_filter_map_join("+", |x| (*x != 2).then(|| x.to_string())),
            "1+3"
        );
    }
}
