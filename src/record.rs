//! One NDJSON line → one untyped `Record`.

use crate::error::ParseError;
use serde_json::{Map, Value};

/// Untyped bag of fields as decoded from one line. Submissions and comments
/// carry different keys; nothing here assumes which.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Key is present, even when its value is `null`.
    #[inline]
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String view of a field; `None` when absent, null or not a string.
    #[inline]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse one line. Blank lines are `ParseError::Empty` (counted as malformed);
/// anything but a JSON object is `ParseError::Malformed`.
pub fn parse(line: &str) -> Result<Record, ParseError> {
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => Ok(Record(map)),
        Ok(other) => Err(ParseError::Malformed(format!("expected object, got {}", json_kind(&other)))),
        Err(e) => Err(ParseError::Malformed(e.to_string())),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
