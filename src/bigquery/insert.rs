//! Streaming insert results

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options for streaming inserts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsertOptions {
    /// Insert the valid rows even if some rows are invalid
    pub skip_invalid: bool,
    /// Ignore values that do not match the schema
    pub ignore_unknown: bool,
}

/// Error detail reported by BigQuery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub debug_info: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Errors for one rejected row
#[derive(Debug, Clone, PartialEq)]
pub struct InsertError {
    pub index: usize,
    pub row: Map<String, Value>,
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct RawInsertError {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

/// Outcome of `Table::insert`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertResponse {
    rows: Vec<Map<String, Value>>,
    errors: Vec<InsertError>,
}

impl InsertResponse {
    pub fn from_response(rows: Vec<Map<String, Value>>, response: &Value) -> Self {
        let raw: Vec<RawInsertError> = response
            .get("insertErrors")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let errors = raw
            .into_iter()
            .map(|e| InsertError {
                row: rows.get(e.index).cloned().unwrap_or_default(),
                index: e.index,
                errors: e.errors,
            })
            .collect();

        Self { rows, errors }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn insert_count(&self) -> usize {
        self.rows.len() - self.error_count()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn insert_errors(&self) -> &[InsertError] {
        &self.errors
    }

    pub fn error_rows(&self) -> Vec<&Map<String, Value>> {
        self.errors.iter().map(|e| &e.row).collect()
    }

    pub fn errors_for(&self, index: usize) -> &[ErrorProto] {
        self.errors
            .iter()
            .find(|e| e.index == index)
            .map(|e| e.errors.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Map<String, Value>> {
        vec![
            json!({"name": "Alice"}).as_object().unwrap().clone(),
            json!({"name": "Bob", "age": "x"}).as_object().unwrap().clone(),
        ]
    }

    #[test]
    fn test_all_rows_inserted() {
        let response = InsertResponse::from_response(rows(), &json!({"kind": "bigquery#tableDataInsertAllResponse"}));
        assert!(response.is_success());
        assert_eq!(response.insert_count(), 2);
        assert_eq!(response.error_count(), 0);
    }

    #[test]
    fn test_errors_are_matched_to_rows() {
        let response = InsertResponse::from_response(
            rows(),
            &json!({
                "insertErrors": [
                    {"index": 1, "errors": [{"reason": "invalid", "location": "age", "message": "Cannot convert"}]}
                ]
            }),
        );
        assert!(!response.is_success());
        assert_eq!(response.insert_count(), 1);
        assert_eq!(response.error_rows()[0]["name"], "Bob");
        assert_eq!(response.errors_for(1)[0].reason.as_deref(), Some("invalid"));
        assert!(response.errors_for(0).is_empty());
    }
}
