//! Cached resource documents

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Whether a representation carries every field of the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    /// Summary subset, as returned by list and create calls
    Partial,
    /// Every field, as returned by get and patch calls
    Full,
}

/// Last known server state of a resource.
///
/// Keys follow the REST resource schema verbatim (`tableReference`,
/// `creationTime`, ...). JSON `null` is treated the same as an absent key.
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    fields: Map<String, Value>,
    completeness: Completeness,
}

impl Representation {
    pub fn new(value: Value, completeness: Completeness) -> Result<Self> {
        Ok(Self {
            fields: into_object(value)?,
            completeness,
        })
    }

    pub fn partial(value: Value) -> Result<Self> {
        Self::new(value, Completeness::Partial)
    }

    pub fn full(value: Value) -> Result<Self> {
        Self::new(value, Completeness::Full)
    }

    pub fn completeness(&self) -> Completeness {
        self.completeness
    }

    pub fn is_full(&self) -> bool {
        self.completeness == Completeness::Full
    }

    /// Replace the whole document. Nothing changes if `value` is not an object.
    pub fn replace(&mut self, value: Value, completeness: Completeness) -> Result<()> {
        self.fields = into_object(value)?;
        self.completeness = completeness;
        Ok(())
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// Look up a dotted path such as `tableReference.tableId`
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.get(first)?;
        for part in parts {
            current = current.get(part)?;
        }
        (!current.is_null()).then_some(current)
    }

    pub fn str(&self, path: &str) -> Option<String> {
        self.pointer(path).and_then(value_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::UnexpectedResponse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn value_str(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Integers arrive either as JSON numbers or as decimal strings (int64 fields)
pub fn value_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn value_u64(value: &Value) -> Option<u64> {
    value_i64(value).and_then(|v| u64::try_from(v).ok())
}

pub fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Milliseconds since the epoch, as used by BigQuery timestamps
pub fn value_millis(value: &Value) -> Option<DateTime<Utc>> {
    value_i64(value).and_then(DateTime::from_timestamp_millis)
}

/// RFC 3339 timestamps, as used by Cloud Storage
pub fn value_rfc3339(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_non_objects() {
        assert!(Representation::full(json!([1, 2])).is_err());
        assert!(Representation::partial(Value::Null).is_err());
    }

    #[test]
    fn test_failed_replace_keeps_document() {
        let mut rep = Representation::partial(json!({"id": "a"})).unwrap();
        let before = rep.clone();
        assert!(rep.replace(json!("oops"), Completeness::Full).is_err());
        assert_eq!(rep, before);
    }

    #[test]
    fn test_pointer_and_null() {
        let rep = Representation::full(json!({
            "tableReference": {"projectId": "p", "tableId": "t"},
            "expirationTime": null
        }))
        .unwrap();
        assert_eq!(rep.str("tableReference.tableId").as_deref(), Some("t"));
        assert!(rep.pointer("tableReference.datasetId").is_none());
        assert!(rep.get("expirationTime").is_none());
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(value_i64(&json!("1440000000000")), Some(1_440_000_000_000));
        assert_eq!(value_i64(&json!(42)), Some(42));
        assert_eq!(value_u64(&json!(-1)), None);
        assert_eq!(value_bool(&json!("true")), Some(true));
    }

    #[test]
    fn test_timestamps() {
        let ts = value_millis(&json!(1_440_000_000_123i64)).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_440_000_000_123);
        let ts = value_rfc3339(&json!("2015-08-19T15:20:00.000Z")).unwrap();
        assert_eq!(ts.timestamp(), 1_439_997_600);
    }
}
