use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use super::ProfileError;

/// Profile for the common ECAM monitor layout.
const BUILTIN_PROFILE: &str = include_str!("../../profiles/default.json");

/// Byte arrays a flag can address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlagSource {
    Alarms,
    Switches,
}

impl FlagSource {
    fn parse(source: &str) -> Option<Self> {
        match source {
            "alarms" => Some(Self::Alarms),
            "switches" => Some(Self::Switches),
            _ => None,
        }
    }
}

/// Any monitor field a predicate can compare against.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldSource {
    Alarms,
    Switches,
    Status,
    Action,
    Progress,
    Accessory,
}

impl FieldSource {
    fn parse(source: &str) -> Option<Self> {
        Some(match source {
            "alarms" => Self::Alarms,
            "switches" => Self::Switches,
            "status" => Self::Status,
            "action" => Self::Action,
            "progress" => Self::Progress,
            "accessory" => Self::Accessory,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagDefinition {
    pub source: FlagSource,
    pub byte: usize,
    pub bit: u8,
    pub invert: bool,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Equals { source: FieldSource, value: Value },
    NotEquals { source: FieldSource, value: Value },
    InSet { source: FieldSource, values: Vec<Value> },
    NotInSet { source: FieldSource, values: Vec<Value> },
    FlagTrue { flag: String },
    FlagFalse { flag: String },
    BitSet { source: FlagSource, byte: usize, bit: u8 },
    BitClear { source: FlagSource, byte: usize, bit: u8 },
}

#[derive(Deserialize)]
struct RawFlag {
    source: Option<String>,
    #[serde(default)]
    byte: i64,
    #[serde(default)]
    bit: i64,
    #[serde(default)]
    invert: bool,
    description: Option<String>,
}

#[derive(Deserialize)]
struct RawPredicate {
    kind: Option<String>,
    source: Option<String>,
    value: Option<Value>,
    values: Option<Vec<Value>>,
    set: Option<Vec<Value>>,
    #[serde(rename = "in")]
    in_: Option<Vec<Value>>,
    flag: Option<String>,
    byte: Option<i64>,
    bit: Option<i64>,
}

#[derive(Deserialize, Default)]
struct RawProfile {
    flags: Option<BTreeMap<String, RawFlag>>,
    enums: Option<BTreeMap<String, Option<BTreeMap<String, String>>>>,
    predicates: Option<BTreeMap<String, RawPredicate>>,
}

/// A validated monitor profile. Every definition is checked when the profile is loaded, so
/// evaluation never meets an unknown kind or source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonitorProfile {
    pub flags: BTreeMap<String, FlagDefinition>,
    /// Enum name (`status`, `action`, `accessory`) to code to display name.
    pub enums: BTreeMap<String, BTreeMap<u8, String>>,
    pub predicates: BTreeMap<String, Predicate>,
}

fn check_bit(context: &str, bit: i64) -> Result<u8, ProfileError> {
    u8::try_from(bit)
        .ok()
        .filter(|bit| *bit <= 7)
        .ok_or_else(|| ProfileError::BitOutOfRange(context.to_owned()))
}

fn check_byte(context: &str, byte: i64) -> Result<usize, ProfileError> {
    usize::try_from(byte).map_err(|_| ProfileError::ByteOutOfRange(context.to_owned()))
}

/// Enum codes are decimal strings, with `0x` hex accepted as well.
fn parse_code(code: &str) -> Option<u8> {
    let code = code.trim();
    match code.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => code.parse().ok(),
    }
}

impl RawFlag {
    fn validate(self, name: &str) -> Result<FlagDefinition, ProfileError> {
        let source = self
            .source
            .as_deref()
            .and_then(FlagSource::parse)
            .ok_or_else(|| ProfileError::InvalidFlagSource(name.to_owned()))?;
        Ok(FlagDefinition {
            source,
            byte: check_byte(name, self.byte)?,
            bit: check_bit(name, self.bit)?,
            invert: self.invert,
            description: self.description,
        })
    }
}

impl RawPredicate {
    fn validate(
        self,
        name: &str,
        flags: &BTreeMap<String, FlagDefinition>,
    ) -> Result<Predicate, ProfileError> {
        let missing = |field: &'static str| ProfileError::MissingField {
            name: name.to_owned(),
            field,
        };
        let kind = self.kind.clone().ok_or_else(|| missing("kind"))?;
        let field_source = || -> Result<FieldSource, ProfileError> {
            let source = self.source.as_deref().ok_or_else(|| missing("source"))?;
            FieldSource::parse(source).ok_or_else(|| ProfileError::InvalidSource {
                name: name.to_owned(),
                given: source.to_owned(),
            })
        };
        let flag_source = || -> Result<FlagSource, ProfileError> {
            let source = self.source.as_deref().ok_or_else(|| missing("source"))?;
            FlagSource::parse(source).ok_or_else(|| ProfileError::InvalidFlagSource(name.to_owned()))
        };
        let flag = || -> Result<String, ProfileError> {
            let flag = self.flag.clone().ok_or_else(|| missing("flag"))?;
            if !flags.contains_key(&flag) {
                return Err(ProfileError::UnknownFlag {
                    name: name.to_owned(),
                    flag,
                });
            }
            Ok(flag)
        };
        let values = || {
            self.values
                .clone()
                .or_else(|| self.set.clone())
                .or_else(|| self.in_.clone())
                .unwrap_or_default()
        };
        let address = || -> Result<(usize, u8), ProfileError> {
            let byte = self.byte.ok_or_else(|| missing("byte"))?;
            let bit = self.bit.ok_or_else(|| missing("bit"))?;
            Ok((check_byte(name, byte)?, check_bit(name, bit)?))
        };
        // A bit given on a non-bit predicate is still range-checked.
        if let Some(bit) = self.bit {
            check_bit(name, bit)?;
        }

        Ok(match kind.as_str() {
            "equals" => Predicate::Equals {
                source: field_source()?,
                value: self.value.clone().unwrap_or(Value::Null),
            },
            "not_equals" => Predicate::NotEquals {
                source: field_source()?,
                value: self.value.clone().unwrap_or(Value::Null),
            },
            "in_set" => Predicate::InSet {
                source: field_source()?,
                values: values(),
            },
            "not_in_set" => Predicate::NotInSet {
                source: field_source()?,
                values: values(),
            },
            "flag_true" => Predicate::FlagTrue { flag: flag()? },
            "flag_false" => Predicate::FlagFalse { flag: flag()? },
            "bit_set" => {
                let (byte, bit) = address()?;
                Predicate::BitSet {
                    source: flag_source()?,
                    byte,
                    bit,
                }
            }
            "bit_clear" => {
                let (byte, bit) = address()?;
                Predicate::BitClear {
                    source: flag_source()?,
                    byte,
                    bit,
                }
            }
            _ => {
                return Err(ProfileError::UnknownPredicateKind {
                    name: name.to_owned(),
                    kind,
                })
            }
        })
    }
}

impl MonitorProfile {
    pub fn from_json_str(json: &str) -> Result<Self, ProfileError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Loads a profile from JSON. `null` yields an empty profile.
    pub fn from_value(value: Value) -> Result<Self, ProfileError> {
        let raw: RawProfile = match value {
            Value::Null => RawProfile::default(),
            value => serde_json::from_value(value)?,
        };

        let mut flags = BTreeMap::new();
        for (name, flag) in raw.flags.unwrap_or_default() {
            let flag = flag.validate(&name)?;
            flags.insert(name, flag);
        }

        let mut predicates = BTreeMap::new();
        for (name, predicate) in raw.predicates.unwrap_or_default() {
            let predicate = predicate.validate(&name, &flags)?;
            predicates.insert(name, predicate);
        }

        let mut enums = BTreeMap::new();
        for (name, mapping) in raw.enums.unwrap_or_default() {
            let mut codes = BTreeMap::new();
            for (code, label) in mapping.unwrap_or_default() {
                let parsed = parse_code(&code).ok_or_else(|| ProfileError::InvalidEnumCode {
                    name: name.clone(),
                    code: code.clone(),
                })?;
                codes.insert(parsed, label);
            }
            enums.insert(name, codes);
        }

        Ok(MonitorProfile {
            flags,
            enums,
            predicates,
        })
    }

    pub fn load(path: &std::path::Path) -> Result<Self, ProfileError> {
        let file = std::fs::File::open(path).map_err(serde_json::Error::io)?;
        Self::from_value(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// The profile shipped with the crate.
    pub fn builtin() -> Result<Self, ProfileError> {
        Self::from_json_str(BUILTIN_PROFILE)
    }

    /// Flag and predicate names, sorted and de-duplicated.
    pub fn available_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .flags
            .keys()
            .chain(self.predicates.keys())
            .cloned()
            .collect();
        fields.sort();
        fields.dedup();
        fields
    }

    pub fn summary(&self) -> Value {
        json!({
            "flags": self.flags.keys().collect::<Vec<_>>(),
            "enums": self
                .enums
                .iter()
                .map(|(name, codes)| (name.clone(), json!(codes.keys().collect::<Vec<_>>())))
                .collect::<serde_json::Map<_, _>>(),
            "predicates": self.predicates.keys().collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[test]
    fn builtin_profile_loads() {
        let profile = MonitorProfile::builtin().expect("builtin");
        assert_eq!(profile.enums["status"][&7], "ready");
        assert_eq!(profile.flags["empty_water_tank"].source, FlagSource::Alarms);
        assert!(profile.flags["water_tank_present"].invert);
        assert!(profile.available_fields().contains(&"has_alarm".to_owned()));
    }

    #[test]
    fn empty_profiles() {
        assert_eq!(MonitorProfile::from_value(Value::Null).unwrap(), MonitorProfile::default());
        assert_eq!(MonitorProfile::from_json_str("{}").unwrap(), MonitorProfile::default());
        let profile =
            MonitorProfile::from_json_str(r#"{"flags": null, "enums": {"status": null}}"#).unwrap();
        assert!(profile.enums["status"].is_empty());
    }

    #[test]
    fn predicate_aliases_for_values() {
        let profile = MonitorProfile::from_json_str(
            r#"{"predicates": {
                "a": {"kind": "in_set", "source": "status", "set": [1, 2]},
                "b": {"kind": "not_in_set", "source": "action", "in": [3]},
                "c": {"kind": "in_set", "source": "progress"}
            }}"#,
        )
        .unwrap();
        assert_eq!(
            profile.predicates["a"],
            Predicate::InSet {
                source: FieldSource::Status,
                values: vec![json!(1), json!(2)]
            }
        );
        assert_eq!(
            profile.predicates["b"],
            Predicate::NotInSet {
                source: FieldSource::Action,
                values: vec![json!(3)]
            }
        );
        assert_eq!(
            profile.predicates["c"],
            Predicate::InSet {
                source: FieldSource::Progress,
                values: vec![]
            }
        );
    }

    #[rstest]
    #[case(r#"{"flags": {"f": {"source": "status", "byte": 0, "bit": 0}}}"#, "InvalidFlagSource")]
    #[case(r#"{"flags": {"f": {"byte": 0, "bit": 0}}}"#, "InvalidFlagSource")]
    #[case(r#"{"flags": {"f": {"source": "alarms", "byte": 0, "bit": 8}}}"#, "BitOutOfRange")]
    #[case(r#"{"flags": {"f": {"source": "alarms", "byte": -1, "bit": 1}}}"#, "ByteOutOfRange")]
    #[case(r#"{"predicates": {"p": {"kind": "greater_than", "source": "status"}}}"#, "UnknownPredicateKind")]
    #[case(r#"{"predicates": {"p": {"kind": "equals", "source": "temperature"}}}"#, "InvalidSource")]
    #[case(r#"{"predicates": {"p": {"kind": "equals"}}}"#, "MissingField")]
    #[case(r#"{"predicates": {"p": {"source": "status"}}}"#, "MissingField")]
    #[case(r#"{"predicates": {"p": {"kind": "flag_true", "flag": "nope"}}}"#, "UnknownFlag")]
    #[case(r#"{"predicates": {"p": {"kind": "bit_set", "source": "alarms", "byte": 0}}}"#, "MissingField")]
    #[case(r#"{"predicates": {"p": {"kind": "bit_set", "source": "alarms", "byte": 0, "bit": 9}}}"#, "BitOutOfRange")]
    #[case(r#"{"predicates": {"p": {"kind": "bit_set", "source": "status", "byte": 0, "bit": 1}}}"#, "InvalidFlagSource")]
    #[case(r#"{"enums": {"status": {"seven": "ready"}}}"#, "InvalidEnumCode")]
    #[case(r#"{"flags": []}"#, "Json")]
    fn rejected_profiles(#[case] json: &str, #[case] expected: &str) {
        let err = MonitorProfile::from_json_str(json).expect_err("should be rejected");
        assert!(
            format!("{:?}", err).starts_with(expected),
            "{:?} is not {}",
            err,
            expected
        );
    }

    #[test]
    fn hex_enum_codes() {
        let profile =
            MonitorProfile::from_json_str(r#"{"enums": {"action": {"0x0a": "ten"}}}"#).unwrap();
        assert_eq!(profile.enums["action"][&10], "ten");
    }

    #[test]
    fn summary_lists_names() {
        let profile = MonitorProfile::from_json_str(
            r#"{"flags": {"f": {"source": "alarms", "byte": 0, "bit": 1}},
                "enums": {"status": {"7": "ready"}},
                "predicates": {"p": {"kind": "flag_true", "flag": "f"}}}"#,
        )
        .unwrap();
        assert_eq!(
            profile.summary(),
            json!({"flags": ["f"], "enums": {"status": [7]}, "predicates": ["p"]})
        );
        assert_eq!(profile.available_fields(), vec!["f", "p"]);
    }
}
