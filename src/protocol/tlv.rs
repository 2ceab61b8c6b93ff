//! Tag/value parameter encoding used inside brew and recipe frames.
//!
//! Each parameter is a tag byte followed by its value. Volume tags carry a two-byte big-endian
//! value, every other tag a single byte. There is no explicit length: the width is implied by
//! the tag.

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;

use super::codec::{PartialDecode, PartialEncode};

/// Parameter tag to value.
pub type TlvParams = BTreeMap<u8, u16>;

/// Tags whose values are two bytes wide (coffee, milk and water volumes).
pub const TWO_BYTE_TAGS: [u8; 3] = [0x01, 0x09, 0x0f];

/// Order in which the firmware expects parameters. Unlisted tags follow in ascending order.
pub const PARAM_ORDER: [u8; 19] = [
    0x0b, 0x0c, 0x1c, 0x19, 0x01, 0x0f, 0x1b, 0x02, 0x08, 0x18, 0x1e, 0x20, 0x21, 0x23, 0x24,
    0x25, 0x26, 0x27, 0x09,
];

const PARAM_NAMES: [(u8, &str); 19] = [
    (0x01, "coffee_ml"),
    (0x02, "temperature"),
    (0x08, "double_shot"),
    (0x09, "milk_ml"),
    (0x0b, "foam_level"),
    (0x0c, "milk_first"),
    (0x0f, "water_ml"),
    (0x18, "pre_brew"),
    (0x19, "aroma"),
    (0x1b, "taste"),
    (0x1c, "milk_temp"),
    (0x1e, "recipe_type"),
    (0x20, "my_enabled"),
    (0x21, "my_level"),
    (0x23, "milk_circuit"),
    (0x24, "ice_amount"),
    (0x25, "cups_count"),
    (0x26, "batch_mode"),
    (0x27, "grinder"),
];

lazy_static! {
    static ref NAMES_BY_TAG: HashMap<u8, &'static str> = PARAM_NAMES.iter().copied().collect();
    static ref TAGS_BY_NAME: HashMap<&'static str, u8> =
        PARAM_NAMES.iter().map(|(tag, name)| (*name, *tag)).collect();
}

pub fn is_two_byte(tag: u8) -> bool {
    TWO_BYTE_TAGS.contains(&tag)
}

/// A single tag/value pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TlvEntry {
    pub tag: u8,
    pub value: u16,
}

impl PartialDecode<TlvEntry> for TlvEntry {
    fn partial_decode(input: &mut &[u8]) -> Option<TlvEntry> {
        let mut cursor = *input;
        let tag = <u8>::partial_decode(&mut cursor)?;
        let value = if is_two_byte(tag) {
            <u16>::partial_decode(&mut cursor)?
        } else {
            <u8>::partial_decode(&mut cursor)? as u16
        };
        *input = cursor;
        Some(TlvEntry { tag, value })
    }
}

impl PartialEncode for TlvEntry {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        out.push(self.tag);
        if is_two_byte(self.tag) {
            self.value.partial_encode(out);
        } else {
            out.push(self.value as u8);
        }
    }
}

/// Decodes a TLV byte stream. A trailing entry without enough bytes for its value is dropped,
/// and a repeated tag keeps the last value seen.
pub fn parse_tlv_params(mut data: &[u8]) -> TlvParams {
    let mut params = TlvParams::new();
    while let Some(entry) = TlvEntry::partial_decode(&mut data) {
        params.insert(entry.tag, entry.value);
    }
    params
}

/// Lists the entries of `params` in the order the firmware expects them.
pub fn canonical_entries(params: &TlvParams) -> Vec<TlvEntry> {
    let listed = PARAM_ORDER.iter().filter(|tag| params.contains_key(tag));
    let unlisted = params.keys().filter(|tag| !PARAM_ORDER.contains(tag));
    listed
        .chain(unlisted)
        .map(|tag| TlvEntry {
            tag: *tag,
            value: params[tag],
        })
        .collect()
}

/// Encodes parameters in canonical order. One-byte tags keep only the low byte of their value.
pub fn encode_tlv_params(params: &TlvParams) -> Vec<u8> {
    canonical_entries(params).encode()
}

/// Human-readable name of a tag, or its `0xNN` form when unknown.
pub fn param_name(tag: u8) -> String {
    match NAMES_BY_TAG.get(&tag) {
        Some(name) => (*name).to_owned(),
        None => format!("0x{:02x}", tag),
    }
}

/// Reverse of [`param_name`]: accepts a known name or a `0xNN`/decimal tag.
pub fn param_tag(name: &str) -> Option<u8> {
    let name = name.trim();
    if let Some(tag) = TAGS_BY_NAME.get(name) {
        return Some(*tag);
    }
    if let Some(hex) = name.strip_prefix("0x") {
        return u8::from_str_radix(hex, 16).ok();
    }
    name.parse().ok()
}

pub fn named_params(params: &TlvParams) -> BTreeMap<String, u16> {
    params
        .iter()
        .map(|(tag, value)| (param_name(*tag), *value))
        .collect()
}
