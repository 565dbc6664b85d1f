use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;

/// The captured data of one completed step in a process instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Position of the step within its process, starting at 1.
    #[serde(alias = "stepOrder")]
    pub step_order: u32,
    /// Field key to the raw value entered for it.
    #[serde(default)]
    pub data: AHashMap<String, Value>,
}

impl StepRecord {
    pub fn new(step_order: u32, data: AHashMap<String, Value>) -> Self {
        Self { step_order, data }
    }

    /// Resolves a field of this record to a number, if it has one.
    pub fn resolve_field(&self, field_key: &str) -> FieldValue {
        FieldValue::resolve(self.data.get(field_key))
    }

    /// Stores a calculated value under `field_key`. A calculation without a
    /// finite value clears the field, so later formulas report it as missing.
    pub fn store_calculated(&mut self, field_key: &str, value: Option<f64>) {
        match value.and_then(serde_json::Number::from_f64) {
            Some(number) => {
                self.data.insert(field_key.to_string(), Value::Number(number));
            }
            None => {
                self.data.remove(field_key);
            }
        }
    }

    /// Parses a JSON array of step records.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a JSON array of step records from a file.
    pub fn list_from_file(path: &str) -> Result<Vec<Self>, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::list_from_json(&content)?)
    }
}

/// Finds the record for a step. If several records claim the same order the
/// first one wins.
pub fn find_record(records: &[StepRecord], step_order: u32) -> Option<&StepRecord> {
    records.iter().find(|r| r.step_order == step_order)
}

/// What a raw field value resolves to when used in a formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// A plain value that parsed as a number.
    Numeric(f64),
    /// A `{ "value": ... }` wrapper whose inner value parsed as a number.
    Wrapped(f64),
    /// Absent, null, or not numeric.
    Unresolvable,
}

impl FieldValue {
    /// Resolves a raw field value.
    ///
    /// Objects with a `value` property are unwrapped once. Everything else is
    /// rendered to text and parsed leniently: leading whitespace is skipped and
    /// the longest numeric prefix is used, so `"12.5 kg"` resolves to `12.5`.
    pub fn resolve(raw: Option<&Value>) -> FieldValue {
        match raw {
            None | Some(Value::Null) => FieldValue::Unresolvable,
            Some(Value::Object(map)) if map.contains_key("value") => {
                match map.get("value").and_then(parse_lenient) {
                    Some(n) => FieldValue::Wrapped(n),
                    None => FieldValue::Unresolvable,
                }
            }
            Some(other) => match parse_lenient(other) {
                Some(n) => FieldValue::Numeric(n),
                None => FieldValue::Unresolvable,
            },
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(n) | FieldValue::Wrapped(n) => Some(*n),
            FieldValue::Unresolvable => None,
        }
    }
}

fn parse_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        other => parse_float_prefix(&value_text(other)),
    }
}

/// Renders a JSON value the way it would read as plain text.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // Arrays read as their elements joined by commas, with nulls left empty.
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => value_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Parses the longest numeric prefix of `text` after leading whitespace.
///
/// Accepts an optional sign, `Infinity`, and decimal literals with an optional
/// fraction and exponent. Returns `None` when no digits can be read.
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut pos = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    if s[pos..].starts_with("Infinity") {
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let mantissa_start = pos;
    let mut digits = 0;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
        digits += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        let mut frac = pos + 1;
        let mut frac_digits = 0;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
            frac_digits += 1;
        }
        if digits > 0 || frac_digits > 0 {
            pos = frac;
            digits += frac_digits;
        }
    }
    if digits == 0 {
        return None;
    }

    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        let exp_digits_start = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits_start {
            pos = exp;
        }
    }

    let magnitude = s[mantissa_start..pos].parse::<f64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
