//! Semantic decoding of raw wire values into unit-correct, human-readable
//! fields. Pure functions, no I/O.
//!
//! Each field name maps to an expected raw shape; a value that does not
//! match its declared shape falls back to its raw string form rather than
//! failing the record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snmp::client::RawSample;
use crate::snmp::oids;
use crate::snmp::transport::RawValue;

/// One decoded field value as it appears in a status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Expected raw shape for a field, declared per field-name pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RawShape {
    /// upsBatteryStatus code, rendered to text alongside its numeric code.
    BatteryStatus,
    /// upsOutputSource code, rendered to text alongside its numeric code.
    OutputSource,
    /// upsTestResultsSummary code, rendered to text alongside its code.
    TestResult,
    /// Fixed-point number with an implicit decimal; divided by the scale.
    Scaled(f64),
    /// Directly-scaled decimal number, passed through unscaled.
    Number,
    /// Plain integer count or duration.
    Count,
    /// Free-form text.
    Text,
}

/// The decode table. First match wins, so the battery group's bare
/// fixed-point names are listed before the generic patterns.
fn shape_for(field: &str) -> RawShape {
    match field {
        "status" => RawShape::BatteryStatus,
        "output_source" => RawShape::OutputSource,
        "results_summary" => RawShape::TestResult,
        // Battery DC readings are reported in tenths (0.1 V / 0.1 A)
        "voltage" | "current" => RawShape::Scaled(10.0),
        _ if field.contains("frequency") => RawShape::Scaled(10.0), // 0.1 Hz
        _ if field.contains("voltage")
            || field.contains("current")
            || field.contains("power")
            || field.contains("temperature") =>
        {
            RawShape::Number
        }
        _ if field.contains("charge") || field.contains("load") || field.contains("percent") => {
            RawShape::Number
        }
        _ if field.contains("time")
            || field.contains("minutes")
            || field.contains("seconds")
            || field.contains("alarms")
            || field.contains("lines") =>
        {
            RawShape::Count
        }
        _ => RawShape::Text,
    }
}

/// Decode a whole sample. Absent fields stay absent; status-code fields
/// expand into a text label plus a `_code` sibling.
pub fn decode_sample(sample: &RawSample) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    for (name, raw) in sample.iter() {
        for (key, value) in decode_field(name, raw) {
            fields.insert(key, value);
        }
    }
    fields
}

/// Decode one field. Returns one entry for plain values, two for status
/// codes (label + numeric code), and the raw string on shape mismatch.
pub fn decode_field(name: &str, raw: &RawValue) -> Vec<(String, FieldValue)> {
    match shape_for(name) {
        RawShape::BatteryStatus => {
            decode_status(name, raw, "battery_status", oids::battery_status_label)
        }
        RawShape::OutputSource => {
            decode_status(name, raw, "output_source", oids::output_source_label)
        }
        RawShape::TestResult => decode_status(name, raw, "test_result", oids::test_result_label),
        RawShape::Scaled(divisor) => match raw_number(raw) {
            Some(v) => vec![(name.to_string(), FieldValue::Float(v / divisor))],
            None => fallback(name, raw),
        },
        RawShape::Number => match raw_number(raw) {
            Some(v) => vec![(name.to_string(), FieldValue::Float(v))],
            None => fallback(name, raw),
        },
        RawShape::Count => match raw_integer(raw) {
            Some(v) => vec![(name.to_string(), FieldValue::Int(v))],
            None => fallback(name, raw),
        },
        RawShape::Text => vec![(name.to_string(), FieldValue::Text(raw.to_string()))],
    }
}

fn decode_status(
    name: &str,
    raw: &RawValue,
    label_key: &str,
    label: fn(i64) -> Option<&'static str>,
) -> Vec<(String, FieldValue)> {
    let Some(code) = raw_integer(raw) else {
        return fallback(name, raw);
    };
    let text = match label(code) {
        Some(text) => text.to_string(),
        None => format!("unknown ({})", code),
    };
    vec![
        (label_key.to_string(), FieldValue::Text(text)),
        (format!("{}_code", label_key), FieldValue::Int(code)),
    ]
}

fn fallback(name: &str, raw: &RawValue) -> Vec<(String, FieldValue)> {
    vec![(name.to_string(), FieldValue::Text(raw.to_string()))]
}

fn raw_integer(raw: &RawValue) -> Option<i64> {
    match raw {
        RawValue::Int(v) => Some(*v),
        RawValue::Str(s) => s.trim().parse().ok(),
    }
}

fn raw_number(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Int(v) => Some(*v as f64),
        RawValue::Str(s) => s.trim().parse().ok(),
    }
}
