use serde_json::{json, Value};

use super::profile::{FieldSource, FlagSource, MonitorProfile, Predicate};
use crate::protocol::{MonitorFrame, MonitorSnapshot};
use crate::util::get_bit;

/// Result of looking up a name that may be either a flag or a predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Flag(Option<bool>),
    Predicate(Option<bool>),
    NotFound,
}

/// A monitor reading interpreted through a [`MonitorProfile`].
///
/// Nothing here fails: a missing frame or an out-of-range byte or bit reads as `None`.
pub struct MonitorView<'a> {
    frame: Option<MonitorFrame>,
    profile: &'a MonitorProfile,
}

impl<'a> MonitorView<'a> {
    pub fn new(snapshot: &MonitorSnapshot, profile: &'a MonitorProfile) -> Self {
        let frame = snapshot
            .frame
            .clone()
            .or_else(|| MonitorFrame::from_b64(&snapshot.raw_b64).ok());
        MonitorView { frame, profile }
    }

    pub fn from_frame(frame: Option<MonitorFrame>, profile: &'a MonitorProfile) -> Self {
        MonitorView { frame, profile }
    }

    pub fn frame(&self) -> Option<&MonitorFrame> {
        self.frame.as_ref()
    }

    pub fn status_code(&self) -> Option<u8> {
        self.frame.as_ref().map(|f| f.status)
    }

    pub fn action_code(&self) -> Option<u8> {
        self.frame.as_ref().map(|f| f.action)
    }

    pub fn progress_percent(&self) -> Option<u8> {
        self.frame.as_ref().map(|f| f.progress)
    }

    pub fn accessory_code(&self) -> Option<u8> {
        self.frame.as_ref().map(|f| f.accessory)
    }

    fn enum_name(&self, name: &str, code: Option<u8>) -> Option<String> {
        let code = code?;
        Some(
            self.profile
                .enums
                .get(name)
                .and_then(|codes| codes.get(&code))
                .cloned()
                .unwrap_or_else(|| code.to_string()),
        )
    }

    pub fn status_name(&self) -> Option<String> {
        self.enum_name("status", self.status_code())
    }

    pub fn action_name(&self) -> Option<String> {
        self.enum_name("action", self.action_code())
    }

    pub fn accessory_name(&self) -> Option<String> {
        self.enum_name("accessory", self.accessory_code())
    }

    fn bytes(&self, source: FlagSource) -> Option<&[u8]> {
        let frame = self.frame.as_ref()?;
        Some(match source {
            FlagSource::Alarms => &frame.alarms[..],
            FlagSource::Switches => &frame.switches[..],
        })
    }

    fn bit(&self, source: FlagSource, byte: usize, bit: u8) -> Option<bool> {
        get_bit(*self.bytes(source)?.get(byte)?, bit)
    }

    fn field(&self, source: FieldSource) -> Option<Value> {
        let frame = self.frame.as_ref()?;
        Some(match source {
            FieldSource::Alarms => json!(frame.alarms),
            FieldSource::Switches => json!(frame.switches),
            FieldSource::Status => json!(frame.status),
            FieldSource::Action => json!(frame.action),
            FieldSource::Progress => json!(frame.progress),
            FieldSource::Accessory => json!(frame.accessory),
        })
    }

    /// Resolves a named flag, applying its inversion. Unknown names read as `None`.
    pub fn flag(&self, name: &str) -> Option<bool> {
        let flag = self.profile.flags.get(name)?;
        self.bit(flag.source, flag.byte, flag.bit)
            .map(|set| set != flag.invert)
    }

    /// Evaluates a named predicate. Unknown names read as `None`.
    pub fn predicate(&self, name: &str) -> Option<bool> {
        match self.profile.predicates.get(name)? {
            Predicate::Equals { source, value } => Some(self.field(*source)? == *value),
            Predicate::NotEquals { source, value } => Some(self.field(*source)? != *value),
            Predicate::InSet { source, values } => {
                let field = self.field(*source)?;
                Some(values.contains(&field))
            }
            Predicate::NotInSet { source, values } => {
                let field = self.field(*source)?;
                Some(!values.contains(&field))
            }
            Predicate::FlagTrue { flag } => self.flag(flag),
            Predicate::FlagFalse { flag } => self.flag(flag).map(|set| !set),
            Predicate::BitSet { source, byte, bit } => self.bit(*source, *byte, *bit),
            Predicate::BitClear { source, byte, bit } => {
                self.bit(*source, *byte, *bit).map(|set| !set)
            }
        }
    }

    /// Looks a name up as a flag first, then as a predicate.
    pub fn lookup(&self, name: &str) -> Field {
        if self.profile.flags.contains_key(name) {
            Field::Flag(self.flag(name))
        } else if self.profile.predicates.contains_key(name) {
            Field::Predicate(self.predicate(name))
        } else {
            Field::NotFound
        }
    }

    pub fn available_fields(&self) -> Vec<String> {
        self.profile.available_fields()
    }

    pub fn profile_summary(&self) -> Value {
        self.profile.summary()
    }

    /// Flags currently reading as set, in name order.
    pub fn active_flags(&self) -> Vec<&str> {
        self.profile
            .flags
            .keys()
            .filter(|name| self.flag(name) == Some(true))
            .map(String::as_str)
            .collect()
    }

    pub fn to_json(&self) -> Value {
        let flags: serde_json::Map<String, Value> = self
            .profile
            .flags
            .keys()
            .map(|name| (name.clone(), json!(self.flag(name))))
            .collect();
        let predicates: serde_json::Map<String, Value> = self
            .profile
            .predicates
            .keys()
            .map(|name| (name.clone(), json!(self.predicate(name))))
            .collect();
        json!({
            "status": self.status_code(),
            "status_name": self.status_name(),
            "action": self.action_code(),
            "action_name": self.action_name(),
            "progress": self.progress_percent(),
            "accessory": self.accessory_code(),
            "accessory_name": self.accessory_name(),
            "flags": flags,
            "predicates": predicates,
        })
    }
}
