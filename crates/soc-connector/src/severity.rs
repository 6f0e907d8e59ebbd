//! Severity Normalization
//!
//! Maps each backend's native severity onto a common 1-5 scale
//! (1 = critical, 5 = informational). Unknown input always lands on 5.

use crate::alert::BackendKind;
use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Wazuh rule levels run from 1 to 15
const RULE_LEVELS: std::ops::RangeInclusive<i64> = 1..=15;

/// Common ordinal severity, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const CRITICAL: Severity = Severity(1);
    pub const HIGH: Severity = Severity(2);
    pub const MEDIUM: Severity = Severity(3);
    pub const LOW: Severity = Severity(4);
    pub const INFO: Severity = Severity(5);

    /// Build from a raw level; anything outside 1..=5 becomes informational
    pub fn from_level(level: u8) -> Self {
        match level {
            1..=5 => Severity(level),
            _ => Self::INFO,
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Critical or high
    pub fn is_high(self) -> bool {
        self <= Self::HIGH
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "critical",
            2 => "high",
            3 => "medium",
            4 => "low",
            _ => "informational",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::INFO
    }
}

impl From<u8> for Severity {
    fn from(level: u8) -> Self {
        Self::from_level(level)
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> u8 {
        severity.0
    }
}

/// Accepts any JSON scalar; values that are not a level in 1..=5 read as
/// informational instead of failing the surrounding document.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SeverityVisitor)
    }
}

struct SeverityVisitor;

impl<'de> Visitor<'de> for SeverityVisitor {
    type Value = Severity;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a severity level")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Severity, E> {
        Ok(u8::try_from(v).map(Severity::from_level).unwrap_or(Severity::INFO))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Severity, E> {
        Ok(u8::try_from(v).map(Severity::from_level).unwrap_or(Severity::INFO))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Severity, E> {
        if v.fract() == 0.0 && (1.0..=5.0).contains(&v) {
            Ok(Severity::from_level(v as u8))
        } else {
            Ok(Severity::INFO)
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Severity, E> {
        match v.trim().parse::<i64>() {
            Ok(level) => self.visit_i64(level),
            Err(_) => Ok(from_label(Some(v))),
        }
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Severity, E> {
        Ok(Severity::INFO)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Severity, E> {
        Ok(Severity::INFO)
    }

    fn visit_none<E: de::Error>(self) -> Result<Severity, E> {
        Ok(Severity::INFO)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Severity, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Severity, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Severity::INFO)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Severity, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(Severity::INFO)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}

/// Normalize a backend-native severity value
pub fn normalize(backend: BackendKind, native: Option<&Value>) -> Severity {
    match backend {
        BackendKind::Splunk => from_label(native.and_then(Value::as_str)),
        BackendKind::Wazuh => from_rule_level(native.and_then(numeric_level)),
    }
}

/// Discrete string levels (Splunk)
pub fn from_label(label: Option<&str>) -> Severity {
    let Some(label) = label else {
        return Severity::INFO;
    };
    match label.trim().to_ascii_lowercase().as_str() {
        "critical" => Severity::CRITICAL,
        "high" => Severity::HIGH,
        "medium" => Severity::MEDIUM,
        "low" => Severity::LOW,
        _ => Severity::INFO,
    }
}

/// Continuous 1-15 rule level, higher is worse (Wazuh).
/// Levels off that scale are informational.
pub fn from_rule_level(level: Option<i64>) -> Severity {
    match level.filter(|l| RULE_LEVELS.contains(l)) {
        Some(l) if l >= 13 => Severity::CRITICAL,
        Some(l) if l >= 10 => Severity::HIGH,
        Some(l) if l >= 7 => Severity::MEDIUM,
        Some(l) if l >= 4 => Severity::LOW,
        _ => Severity::INFO,
    }
}

fn numeric_level(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(finite_level)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(finite_level),
        _ => None,
    }
}

fn finite_level(f: f64) -> Option<i64> {
    f.is_finite().then(|| f as i64)
}
