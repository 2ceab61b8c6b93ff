//! Extractors over a snapshot of cloud properties.
//!
//! Properties are named `d<number>[_suffix]`. Most values are plain integers or strings; the
//! rest are base64 `0xd0` frames whose payload layout depends on the opcode. Every extractor
//! is opportunistic: a property that is missing or cannot be interpreted is left out of the
//! result rather than failing the whole snapshot.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde_json::{Map, Value};

use super::frame::D0Frame;
use super::hardware_enums::beverage_name;
use super::recipe::{decode_recipe_b64, decode_recipe_container, RecipeSnapshot};

const OPCODE_PROFILE_NAMES: u16 = 0xa4f0;
const OPCODE_FAVORITES: u16 = 0xacf0;
const OPCODE_PRIORITY: u16 = 0xa8f0;
const OPCODE_SETTING: u16 = 0x950f;
const OPCODE_ACTIVE_PROFILE: u16 = 0x95f0;
const OPCODE_SERIAL: u16 = 0xa10f;
const OPCODE_BEAN_SYSTEM: u16 = 0xbaf0;

/// Profile names are 11 UTF-16 code units.
const NAME_BLOCK_SIZE: usize = 22;
const NAME_SEPARATOR: u8 = 0x0b;

const MAINTENANCE: [(&str, &str); 10] = [
    ("d510", "grounds_container"),
    ("d512", "descale_progress"),
    ("d513", "water_filter"),
    ("d550", "water_since_descale"),
    ("d551", "grounds_count"),
    ("d552", "total_descale_cycles"),
    ("d553", "total_water_dispensed"),
    ("d554", "total_filter_replacements"),
    ("d555", "water_since_filter"),
    ("d556", "water_hardness_setting"),
];

const SETTINGS: [(&str, &str); 3] = [
    ("d281", "temperature"),
    ("d282", "auto_off"),
    ("d283", "water_hardness"),
];

const JSON_COUNTERS: [&str; 9] = [
    "d702_tot_bev_other",
    "d733_tot_bev_counters",
    "d734_tot_bev_usage",
    "d735_iced_bev",
    "d736_mug_bev",
    "d737_mug_iced_bev",
    "d738_cold_brew_bev",
    "d739_taste_bev",
    "d740_water_qty_bev",
];

/// A set of properties as returned by the cloud or the local server, keyed arbitrarily. Each
/// entry is usually `{"property": {"name": ..., "value": ...}}`.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertiesSnapshot {
    pub raw: Map<String, Value>,
    pub received_at: Option<SystemTime>,
}

impl PropertiesSnapshot {
    pub fn new(raw: Map<String, Value>, received_at: Option<SystemTime>) -> Self {
        Self { raw, received_at }
    }

    /// Finds a property either by top-level key or by its nested `property.name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.raw.get(name) {
            return Some(value);
        }
        self.raw
            .values()
            .find(|entry| entry.pointer("/property/name").and_then(Value::as_str) == Some(name))
    }

    /// `(name, value)` of every well-formed property entry.
    fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.raw.values().filter_map(|entry| {
            let property = entry.get("property")?;
            let name = property.get("name").and_then(Value::as_str).unwrap_or_default();
            Some((name, property.get("value").unwrap_or(&Value::Null)))
        })
    }

    fn value_with_prefix(&self, prefix: &str) -> Option<&Value> {
        self.properties()
            .find(|(name, value)| name.starts_with(prefix) && !value.is_null())
            .map(|(_, value)| value)
    }

    fn string_with_prefix(&self, prefix: &str) -> Option<&str> {
        self.properties()
            .find(|(name, value)| name.starts_with(prefix) && value.is_string())
            .and_then(|(_, value)| value.as_str())
    }

    /// Decodes the frame held by the first property starting with `prefix`, if it carries
    /// `opcode`.
    fn frame_with_prefix(&self, prefix: &str, opcode: u16) -> Option<D0Frame> {
        let b64 = self.string_with_prefix(prefix).filter(|s| !s.is_empty())?;
        D0Frame::from_b64(b64).filter(|frame| frame.opcode == opcode)
    }

    /// All recipes, optionally restricted to one profile. Recipe properties contain `_rec_`
    /// after their number; a value starting with `{` is a container of several recipes.
    pub fn recipes(&self, profile: Option<u8>) -> Vec<RecipeSnapshot> {
        let mut recipes = vec![];
        for (name, value) in self.properties() {
            let Some(value) = value.as_str().filter(|v| !v.is_empty()) else {
                continue;
            };
            if !is_recipe_property(name) {
                continue;
            }
            if value.starts_with('{') {
                recipes.extend(decode_recipe_container(value));
            } else if let Some(recipe) = decode_recipe_b64(value) {
                recipes.push(recipe);
            }
        }
        recipes.retain(|recipe| profile.is_none() || recipe.profile == profile);
        recipes
    }

    /// Per-beverage usage counters from `d7NN..._id<beverage>` properties.
    pub fn counters(&self) -> BTreeMap<String, i64> {
        let mut counters = BTreeMap::new();
        for (name, value) in self.properties() {
            let Some(id) = counter_beverage_id(name) else {
                continue;
            };
            let Some(count) = as_int(value) else {
                continue;
            };
            let label = match u8::try_from(id) {
                Ok(id) => beverage_name(id),
                Err(_) => format!("unknown_0x{:02x}", id),
            };
            counters.insert(label, count);
        }
        counters
    }

    /// Counters from `d7NN_<label>` properties that are not tied to one beverage. A leading
    /// `tot_` is dropped from the label.
    pub fn aggregate_counters(&self) -> BTreeMap<String, i64> {
        let mut counters = BTreeMap::new();
        for (name, value) in self.properties() {
            let Some(label) = aggregate_label(name) else {
                continue;
            };
            if contains_id_suffix(name) {
                continue;
            }
            let Some(count) = as_int(value) else {
                continue;
            };
            let label = label.strip_prefix("tot_").unwrap_or(label);
            counters.insert(label.to_owned(), count);
        }
        counters
    }

    /// Profile names from d051 (profiles 1-3) and d052 (profile 4).
    ///
    /// Payload: `[first][last]` then one 22-byte UTF-16BE block per profile, with a
    /// `[0x0b][profile]` separator before every block after the first.
    pub fn profile_names(&self) -> BTreeMap<u8, String> {
        let mut names = BTreeMap::new();
        for prefix in ["d051", "d052"] {
            let Some(frame) = self.frame_with_prefix(prefix, OPCODE_PROFILE_NAMES) else {
                continue;
            };
            let payload = &frame.payload;
            if payload.len() < 4 {
                continue;
            }
            let (first, last) = (payload[0], payload[1]);
            let mut pos = 2;
            for profile in first..=last {
                if profile > first && payload.get(pos) == Some(&NAME_SEPARATOR) {
                    pos += 2;
                }
                let start = pos.min(payload.len());
                let end = (pos + NAME_BLOCK_SIZE).min(payload.len());
                let block = &payload[start..end];
                pos = end;
                if block.len() < 2 {
                    continue;
                }
                let text = decode_utf16(block, u16::from_be_bytes);
                let name = first_name(&text)
                    .trim_end_matches(|c: char| c == '\u{fffd}' || c == '\u{ffff}')
                    .to_owned();
                if !name.is_empty() {
                    names.insert(profile, name);
                }
            }
        }
        names
    }

    /// Maintenance metrics (d510-d556). Values may be integers or numeric strings.
    pub fn maintenance(&self) -> BTreeMap<&'static str, i64> {
        MAINTENANCE
            .iter()
            .filter_map(|(prefix, metric)| {
                Some((*metric, as_int(self.value_with_prefix(prefix)?)?))
            })
            .collect()
    }

    /// Favorite beverages per profile (d265-d268).
    pub fn favorites(&self) -> BTreeMap<u8, Vec<String>> {
        self.beverage_lists(265, OPCODE_FAVORITES)
    }

    /// On-screen beverage order per profile (d261-d264).
    pub fn recipe_priority(&self) -> BTreeMap<u8, Vec<String>> {
        self.beverage_lists(261, OPCODE_PRIORITY)
    }

    /// Four consecutive properties, each `[profile][beverage ids...]` with zero ids as padding.
    fn beverage_lists(&self, first_property: u32, opcode: u16) -> BTreeMap<u8, Vec<String>> {
        let mut lists = BTreeMap::new();
        for number in first_property..first_property + 4 {
            let Some(frame) = self.frame_with_prefix(&format!("d{}", number), opcode) else {
                continue;
            };
            let Some((profile, ids)) = frame.payload.split_first() else {
                continue;
            };
            let beverages: Vec<String> = ids
                .iter()
                .filter(|id| **id != 0)
                .map(|id| beverage_name(*id))
                .collect();
            if !beverages.is_empty() {
                lists.insert(*profile, beverages);
            }
        }
        lists
    }

    /// Machine settings (d281-d283). Payload: `[00][param][00][00][00][value]`.
    pub fn machine_settings(&self) -> BTreeMap<&'static str, u8> {
        SETTINGS
            .iter()
            .filter_map(|(prefix, setting)| {
                let frame = self.frame_with_prefix(prefix, OPCODE_SETTING)?;
                Some((*setting, *frame.payload.get(5)?))
            })
            .collect()
    }

    /// The active profile number (d286).
    pub fn active_profile(&self) -> Option<u8> {
        self.frame_with_prefix("d286", OPCODE_ACTIVE_PROFILE)?
            .payload
            .first()
            .copied()
    }

    /// The machine serial (d270). Payload: `[00][marker][ASCII...][00]`.
    pub fn serial_number(&self) -> Option<String> {
        let frame = self.frame_with_prefix("d270", OPCODE_SERIAL)?;
        if frame.payload.len() < 3 {
            return None;
        }
        let serial = &frame.payload[2..];
        let end = serial.iter().position(|b| *b == 0).unwrap_or(serial.len());
        let serial = &serial[..end];
        serial
            .is_ascii()
            .then(|| String::from_utf8_lossy(serial).into_owned())
    }

    /// Primary bean name per slot (d250-d256). Payload: `[slot][pad][UTF-16LE names...]`.
    pub fn bean_system(&self) -> BTreeMap<u8, String> {
        let mut beans = BTreeMap::new();
        for number in 250..=256 {
            let Some(frame) = self.frame_with_prefix(&format!("d{}", number), OPCODE_BEAN_SYSTEM)
            else {
                continue;
            };
            if frame.payload.len() < 3 {
                continue;
            }
            let text = decode_utf16(&frame.payload[2..], u16::from_le_bytes);
            let name = first_name(&text);
            if !name.is_empty() && name != "\u{fffd}" {
                beans.insert(frame.payload[0], name.to_owned());
            }
        }
        beans
    }

    /// Service parameters from the JSON objects in d580 and d581. Numeric values are
    /// normalised to integers; anything else is kept as is.
    pub fn service_parameters(&self) -> BTreeMap<String, Value> {
        let mut params = BTreeMap::new();
        for prefix in ["d580", "d581"] {
            let Some(object) = self.string_with_prefix(prefix).and_then(parse_json_object) else {
                continue;
            };
            for (key, value) in object {
                let value = as_int(&value).map(Value::from).unwrap_or(value);
                params.insert(key, value);
            }
        }
        params
    }

    /// Flattened counters from the JSON-valued d702 and d733-d740 properties.
    pub fn json_counters(&self) -> BTreeMap<String, i64> {
        let mut counters = BTreeMap::new();
        for property in JSON_COUNTERS {
            let Some((_, value)) = self.properties().find(|(name, _)| *name == property) else {
                continue;
            };
            let Some(object) = value.as_str().and_then(parse_json_object) else {
                continue;
            };
            for (key, value) in object {
                if let Some(count) = as_int(&value) {
                    counters.insert(key, count);
                }
            }
        }
        counters
    }

    pub fn software_version(&self) -> Option<&str> {
        self.properties()
            .find(|(name, _)| *name == "software_version")
            .and_then(|(_, value)| value.as_str())
            .filter(|version| !version.is_empty())
    }
}

/// Integer value of a property: JSON integers, truncated floats, or numeric strings.
fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_json_object(json: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(json) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Decodes UTF-16 with replacement characters for invalid sequences and a trailing odd byte.
fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let chunks = bytes.chunks_exact(2);
    let odd = !chunks.remainder().is_empty();
    let mut text: String = char::decode_utf16(chunks.map(|c| unit([c[0], c[1]])))
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if odd {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

/// The text before the first NUL, whitespace-trimmed.
fn first_name(text: &str) -> &str {
    text.split('\0').next().unwrap_or_default().trim()
}

fn digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

/// `d<digits>_rec_` anywhere in the name.
fn is_recipe_property(name: &str) -> bool {
    name.match_indices('d').any(|(i, _)| {
        let rest = &name[i + 1..];
        let n = digits(rest);
        n > 0 && rest[n..].starts_with("_rec_")
    })
}

/// `d7NN` where NN are two digits; returns what follows.
fn d7xx_rest(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("d7")?;
    (rest.len() >= 2 && rest.as_bytes()[..2].iter().all(u8::is_ascii_digit)).then(|| &rest[2..])
}

/// The beverage id of a `d7NN..._id<N>` counter, using the last `_id<N>` in the name.
fn counter_beverage_id(name: &str) -> Option<u64> {
    let rest = d7xx_rest(name)?;
    rest.rmatch_indices("_id").find_map(|(i, _)| {
        let tail = &rest[i + 3..];
        let n = digits(tail);
        (n > 0).then(|| tail[..n].parse().ok()).flatten()
    })
}

fn aggregate_label(name: &str) -> Option<&str> {
    d7xx_rest(name)?.strip_prefix('_')
}

fn contains_id_suffix(name: &str) -> bool {
    name.match_indices("_id")
        .any(|(i, _)| digits(&name[i + 3..]) > 0)
}
