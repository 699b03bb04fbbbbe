use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "RawValue")]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Currency(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn date(year: i32, month: u32, day: u32) -> Self {
        NaiveDate::from_ymd_opt(year, month, day).map_or(Value::Null, Value::Date)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Integer(_) | Value::Float(_) | Value::Currency(_)
        )
    }

    /// Numeric view used by aggregations; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) | Value::Currency(f) => Some(*f).filter(|f| f.is_finite()),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null | Value::Text(_) | Value::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn round(&self, decimals: u32) -> Value {
        let factor = 10f64.powi(decimals.min(15) as i32);
        match self {
            Value::Float(f) => Value::Float((f * factor).round() / factor),
            Value::Currency(f) => Value::Currency((f * factor).round() / factor),
            other => other.clone(),
        }
    }

    /// Infer a typed value from delimited-text input.
    pub fn infer(raw: &str) -> Value {
        let value = raw.trim_end_matches('\r');
        if value.trim().is_empty() {
            return Value::Null;
        }
        if let Some(boolean) = parse_bool(value) {
            return Value::Bool(boolean);
        }
        if let Some(int_value) = parse_int(value) {
            return Value::Integer(int_value);
        }
        if let Some(float_value) = parse_float(value) {
            return Value::Float(float_value);
        }
        if let Some(date) = parse_iso_date(value) {
            return Value::Date(date);
        }
        Value::Text(value.to_string())
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) | Value::Float(_) | Value::Currency(_) => 2,
            Value::Date(_) => 3,
            Value::Text(_) => 4,
        }
    }

    /// Total order used to sort pivot keys: type rank first, then value.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let x = a.as_f64().unwrap_or(f64::NAN);
                let y = b.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) | Value::Currency(v) => f.write_str(&format_float(*v)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Hashable, exactly-comparable projection of a [`Value`] for grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Bool(bool),
    Integer(i64),
    Float(u64),
    Currency(u64),
    Date(NaiveDate),
    Text(String),
}

impl KeyPart {
    pub fn from_value(value: &Value) -> Option<KeyPart> {
        match value {
            Value::Null => None,
            Value::Text(s) => Some(KeyPart::Text(s.clone())),
            Value::Integer(i) => Some(KeyPart::Integer(*i)),
            Value::Float(f) => Some(KeyPart::Float(f.to_bits())),
            Value::Currency(f) => Some(KeyPart::Currency(f.to_bits())),
            Value::Date(d) => Some(KeyPart::Date(*d)),
            Value::Bool(b) => Some(KeyPart::Bool(*b)),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            KeyPart::Bool(b) => Value::Bool(*b),
            KeyPart::Integer(i) => Value::Integer(*i),
            KeyPart::Float(bits) => Value::Float(f64::from_bits(*bits)),
            KeyPart::Currency(bits) => Value::Currency(f64::from_bits(*bits)),
            KeyPart::Date(d) => Value::Date(*d),
            KeyPart::Text(s) => Value::Text(s.clone()),
        }
    }
}

pub fn compare_keys(a: &[KeyPart], b: &[KeyPart]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = x.to_value().total_cmp(&y.to_value());
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_int(value: &str) -> Option<i64> {
    let digits = value.trim_start_matches(['+', '-']);
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    value.parse::<i64>().ok()
}

fn parse_float(value: &str) -> Option<f64> {
    if !(value.contains('.') || value.contains('e') || value.contains('E')) {
        return None;
    }
    value.parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let shaped = trimmed.len() == 10
        && trimmed.chars().enumerate().all(|(idx, ch)| match idx {
            4 | 7 => ch == '-',
            _ => ch.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Null(()),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Tagged(TaggedValue),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaggedValue {
    Currency(f64),
    Date(String),
    Text(String),
}

impl TryFrom<RawValue> for Value {
    type Error = String;

    fn try_from(raw: RawValue) -> Result<Self, Self::Error> {
        Ok(match raw {
            RawValue::Null(()) => Value::Null,
            RawValue::Bool(b) => Value::Bool(b),
            RawValue::Integer(i) => Value::Integer(i),
            RawValue::Float(f) => Value::Float(f),
            RawValue::Text(s) => parse_iso_date(&s).map_or(Value::Text(s), Value::Date),
            RawValue::Tagged(TaggedValue::Currency(f)) => Value::Currency(f),
            RawValue::Tagged(TaggedValue::Text(s)) => Value::Text(s),
            RawValue::Tagged(TaggedValue::Date(s)) => parse_iso_date(&s)
                .map(Value::Date)
                .ok_or_else(|| format!("invalid date '{}', expected yyyy-mm-dd", s))?,
        })
    }
}
