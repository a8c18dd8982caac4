//! Table rows read through `tabledata.list`

use super::schema::{Field, FieldType};
use crate::error::Result;
use crate::resource::representation::{value_i64, value_u64};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options for reading table rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataOptions {
    /// Page token from a previous read
    pub token: Option<String>,
    /// Maximum number of rows to return
    pub max: Option<u32>,
    /// Zero-based index of the first row to read
    pub start: Option<u64>,
}

/// One page of rows, keyed by column name
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub rows: Vec<Map<String, Value>>,
    pub token: Option<String>,
    pub total: Option<u64>,
    pub etag: Option<String>,
}

impl TableData {
    /// Decode a `tabledata.list` response using the table's fields
    pub fn from_response(response: &Value, fields: &[Field]) -> Result<Self> {
        let rows = response
            .get("rows")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().map(|row| format_row(row, fields)).collect())
            .unwrap_or_default();

        Ok(Self {
            rows,
            token: response
                .get("pageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            total: response.get("totalRows").and_then(value_u64),
            etag: response
                .get("etag")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn next_options(&self) -> Option<DataOptions> {
        self.token.as_ref().map(|token| DataOptions {
            token: Some(token.clone()),
            ..DataOptions::default()
        })
    }
}

/// Turn `{"f": [{"v": ...}, ...]}` into a map keyed by field name
pub fn format_row(row: &Value, fields: &[Field]) -> Map<String, Value> {
    let cells = row
        .get("f")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    fields
        .iter()
        .zip(cells)
        .map(|(field, cell)| {
            let value = cell.get("v").unwrap_or(&Value::Null);
            (field.name.clone(), format_value(value, field))
        })
        .collect()
}

fn format_value(value: &Value, field: &Field) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    if field.is_repeated() {
        let items = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| format_scalar(item.get("v").unwrap_or(item), field))
                    .collect()
            })
            .unwrap_or_default();
        return Value::Array(items);
    }
    format_scalar(value, field)
}

fn format_scalar(value: &Value, field: &Field) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match field.field_type {
        FieldType::Record => Value::Object(format_row(value, &field.fields)),
        FieldType::Integer => value_i64(value).map(Value::from).unwrap_or_else(|| value.clone()),
        FieldType::Float => value
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| value.clone()),
        FieldType::Boolean => match value.as_str() {
            Some(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Some(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}
