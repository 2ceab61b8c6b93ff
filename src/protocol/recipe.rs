use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::frame::D0Frame;
use super::hardware_enums::beverage_name;
use super::tlv::{named_params, parse_tlv_params, TlvParams};
use crate::util::decode_b64_lenient;

pub const OPCODE_PROFILE_RECIPE: u16 = 0xa6f0;
pub const OPCODE_DEFAULT_RECIPE: u16 = 0xb0f0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RecipeFormat {
    /// `[0xd0][len][0xa6][0xf0][profile][beverage][TLV...][crc]`
    Profile,
    /// `[0xd0][len][0xb0][0xf0][beverage][...][crc]`
    Default,
    Unknown,
}

impl RecipeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Default => "default",
            Self::Unknown => "unknown",
        }
    }
}

/// A recipe stored as a cloud property value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecipeSnapshot {
    pub format: RecipeFormat,
    pub beverage: u8,
    pub profile: Option<u8>,
    pub params: TlvParams,
    pub named_params: BTreeMap<String, u16>,
    pub crc_ok: bool,
    pub raw_hex: String,
}

impl RecipeSnapshot {
    fn from_frame(frame: D0Frame) -> RecipeSnapshot {
        let raw_hex = frame.raw_hex();
        match frame.opcode {
            OPCODE_PROFILE_RECIPE => {
                let crc_start = (frame.length as usize + 1)
                    .min(frame.raw.len())
                    .saturating_sub(2);
                let params = parse_tlv_params(frame.raw.get(6..crc_start).unwrap_or_default());
                RecipeSnapshot {
                    format: RecipeFormat::Profile,
                    beverage: frame.raw[5],
                    profile: Some(frame.raw[4]),
                    named_params: named_params(&params),
                    params,
                    crc_ok: frame.crc_ok,
                    raw_hex,
                }
            }
            // Default recipe parameters use a different layout and are not decoded.
            OPCODE_DEFAULT_RECIPE => RecipeSnapshot {
                format: RecipeFormat::Default,
                beverage: frame.raw[4],
                profile: None,
                params: TlvParams::new(),
                named_params: BTreeMap::new(),
                crc_ok: frame.crc_ok,
                raw_hex,
            },
            opcode => {
                crate::warning!("unknown recipe command {:04x}", opcode);
                RecipeSnapshot {
                    format: RecipeFormat::Unknown,
                    beverage: 0,
                    profile: None,
                    params: TlvParams::new(),
                    named_params: BTreeMap::new(),
                    crc_ok: false,
                    raw_hex,
                }
            }
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "format": self.format.as_str(),
            "beverage": self.beverage,
            "beverage_name": beverage_name(self.beverage),
            "profile": self.profile,
            "params": self.named_params,
            "crc_ok": self.crc_ok,
            "raw_hex": self.raw_hex,
        })
    }
}

/// Decodes one recipe frame. `None` for fewer than six bytes or a missing `0xd0` marker;
/// checksum failures are reported through `crc_ok` instead.
pub fn decode_recipe(raw: &[u8]) -> Option<RecipeSnapshot> {
    D0Frame::decode(raw).map(RecipeSnapshot::from_frame)
}

pub fn decode_recipe_b64(b64: &str) -> Option<RecipeSnapshot> {
    decode_recipe(&decode_b64_lenient(b64)?)
}

/// Decodes a JSON object whose values are base64 recipe strings. Non-string values and
/// undecodable entries are skipped; anything other than a JSON object yields nothing.
pub fn decode_recipe_container(json: &str) -> Vec<RecipeSnapshot> {
    let Ok(Value::Object(container)) = serde_json::from_str::<Value>(json) else {
        return vec![];
    };
    container
        .values()
        .filter_map(Value::as_str)
        .filter_map(decode_recipe_b64)
        .collect()
}
