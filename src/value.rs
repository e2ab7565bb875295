//! Runtime value model that queries are evaluated against.
//!
//! Every record is converted into a [`Value`] tree before evaluation, so path
//! resolution and comparison never need to know the concrete record type.
//! Any `T: Serialize` is a [`Record`] through `serde_json`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::ser::{Serialize, Serializer};

/// A dynamically typed record value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent optional, JSON null, or unit.
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Ordered collection (vectors, slices, sets, tuples).
    Sequence(Vec<Value>),
    /// Named members (structs and string-keyed maps).
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    /// Looks up a member by name: exact key first, then case-insensitively.
    ///
    /// Only mappings have members.
    pub fn get_member(&self, name: &str) -> Option<&Value> {
        let Value::Mapping(members) = self else {
            return None;
        };
        members.get(name).or_else(|| {
            members
                .iter()
                .find(|(key, _)| fold_eq(key, name))
                .map(|(_, value)| value)
        })
    }

    /// Whether the value reads as null under `IS NULL`.
    ///
    /// Null, the empty string, numeric zero, `false` and empty collections all
    /// count as null.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.is_zero(),
            Value::String(s) => s.is_empty(),
            Value::Sequence(items) => items.is_empty(),
            Value::Mapping(members) => members.is_empty(),
        }
    }
}

/// Case-insensitive string equality, used for member names and field paths.
pub(crate) fn fold_eq(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Numeric value in one of three domains.
///
/// Promotion is decided once, in [`Number::compare`]:
/// - same domain compares natively,
/// - signed against unsigned compares exactly (negatives sort first),
/// - anything involving a float compares as `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 64-bit floating point.
    F64(f64),
}

impl Number {
    /// Converts the number to f64 for comparison.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// Compares two numbers, handling mixed domains. `None` only when NaN is involved.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Some(a.cmp(&b)),
            (Number::U64(a), Number::U64(b)) => Some(a.cmp(&b)),
            (Number::I64(a), Number::U64(b)) => Some(match u64::try_from(a) {
                Ok(a) => a.cmp(&b),
                Err(_) => Ordering::Less,
            }),
            (Number::U64(a), Number::I64(b)) => Some(match u64::try_from(b) {
                Ok(b) => a.cmp(&b),
                Err(_) => Ordering::Greater,
            }),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::I64(n) => n == 0,
            Number::U64(n) => n == 0,
            Number::F64(n) => n == 0.0,
        }
    }

    /// Parses a query literal: grouping commas are stripped, then `i64`,
    /// `u64` and finally finite `f64` are tried in that order.
    pub fn parse_literal(text: &str) -> Option<Number> {
        let cleaned: String = text.chars().filter(|c| *c != ',').collect();
        if let Ok(n) = cleaned.parse::<i64>() {
            return Some(Number::I64(n));
        }
        if let Ok(n) = cleaned.parse::<u64>() {
            return Some(Number::U64(n));
        }
        // rejects `inf` and `NaN` spellings that f64::from_str accepts
        if !cleaned.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')) {
            return None;
        }
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Number::F64)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(*other)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::I64(i64::from(n))
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::I64(n)
    }
}

impl From<u32> for Number {
    fn from(n: u32) -> Self {
        Number::U64(u64::from(n))
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        Number::U64(n)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::F64(n)
    }
}

impl From<serde_json::Number> for Number {
    fn from(n: serde_json::Number) -> Self {
        if let Some(u) = n.as_u64() {
            Number::U64(u)
        } else if let Some(i) = n.as_i64() {
            Number::I64(i)
        } else {
            Number::F64(n.as_f64().unwrap_or(f64::NAN))
        }
    }
}

/// Parses a boolean literal; accepts `1 t T TRUE true True 0 f F FALSE false False`.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.into()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(members) => Value::Mapping(
                members
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(Number::from(n))
                }
            }
        )*
    };
}

value_from_number!(i32, i64, u32, u64, f64);

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(Number::I64(n)) => serializer.serialize_i64(*n),
            Value::Number(Number::U64(n)) => serializer.serialize_u64(*n),
            Value::Number(Number::F64(n)) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(items) => serializer.collect_seq(items),
            Value::Mapping(members) => serializer.collect_map(members),
        }
    }
}

/// Adapter from a concrete record type to the [`Value`] model.
///
/// Implemented for every `Serialize` type: struct fields become mapping
/// members (so `#[serde(rename)]` controls the queryable name), `None`
/// becomes `Null` and collections become sequences.
pub trait Record {
    fn to_value(&self) -> Result<Value, serde_json::Error>;
}

impl<T: Serialize + ?Sized> Record for T {
    fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self).map(Value::from)
    }
}
