//! Table schemas and the schema builder

use serde::{Deserialize, Serialize};

/// Column type. Unknown types from the server are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Bytes,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
    Time,
    Datetime,
    Record,
    Other(String),
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "STRING" => FieldType::String,
            "BYTES" => FieldType::Bytes,
            "INTEGER" | "INT64" => FieldType::Integer,
            "FLOAT" | "FLOAT64" => FieldType::Float,
            "BOOLEAN" | "BOOL" => FieldType::Boolean,
            "TIMESTAMP" => FieldType::Timestamp,
            "DATE" => FieldType::Date,
            "TIME" => FieldType::Time,
            "DATETIME" => FieldType::Datetime,
            "RECORD" | "STRUCT" => FieldType::Record,
            _ => FieldType::Other(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "STRING",
            FieldType::Bytes => "BYTES",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::Datetime => "DATETIME",
            FieldType::Record => "RECORD",
            FieldType::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    Nullable,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FieldMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested fields of a RECORD
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

impl Field {
    pub fn is_repeated(&self) -> bool {
        self.mode == Some(FieldMode::Repeated)
    }
}

/// An immutable table schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Top-level column names in order
    pub fn headers(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Start a builder seeded with this schema's fields
    pub fn to_builder(&self) -> SchemaBuilder {
        SchemaBuilder::from_schema(self)
    }
}

/// Options for a single field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    pub mode: Option<FieldMode>,
    pub description: Option<String>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required() -> Self {
        FieldMode::Required.into()
    }

    pub fn repeated() -> Self {
        FieldMode::Repeated.into()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<FieldMode> for FieldOptions {
    fn from(mode: FieldMode) -> Self {
        Self {
            mode: Some(mode),
            description: None,
        }
    }
}

/// Accumulates fields for a schema.
///
/// Tracks whether anything was added, removed, or edited so callers can skip
/// sending an unchanged schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    fields: Vec<Field>,
    changed: bool,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schema(schema: &Schema) -> Self {
        Self {
            fields: schema.fields.clone(),
            changed: false,
        }
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn field(
        &mut self,
        name: &str,
        field_type: FieldType,
        options: impl Into<FieldOptions>,
    ) -> &mut Self {
        let options = options.into();
        self.fields.push(Field {
            name: name.to_string(),
            field_type,
            mode: options.mode,
            description: options.description,
            fields: Vec::new(),
        });
        self.changed = true;
        self
    }

    pub fn string(&mut self, name: &str, options: impl Into<FieldOptions>) -> &mut Self {
        self.field(name, FieldType::String, options)
    }

    pub fn integer(&mut self, name: &str, options: impl Into<FieldOptions>) -> &mut Self {
        self.field(name, FieldType::Integer, options)
    }

    pub fn float(&mut self, name: &str, options: impl Into<FieldOptions>) -> &mut Self {
        self.field(name, FieldType::Float, options)
    }

    pub fn boolean(&mut self, name: &str, options: impl Into<FieldOptions>) -> &mut Self {
        self.field(name, FieldType::Boolean, options)
    }

    pub fn timestamp(&mut self, name: &str, options: impl Into<FieldOptions>) -> &mut Self {
        self.field(name, FieldType::Timestamp, options)
    }

    /// Add a RECORD field whose nested fields are defined by `nested`
    pub fn record<F>(&mut self, name: &str, options: impl Into<FieldOptions>, nested: F) -> &mut Self
    where
        F: FnOnce(&mut SchemaBuilder),
    {
        let mut inner = SchemaBuilder::new();
        nested(&mut inner);
        self.field(name, FieldType::Record, options);
        if let Some(field) = self.fields.last_mut() {
            field.fields = inner.fields;
        }
        self
    }

    /// Remove a top-level field by name
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| f.name != name);
        let removed = self.fields.len() != before;
        self.changed |= removed;
        removed
    }

    /// Edit a top-level field in place
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        let field = self.fields.iter_mut().find(|f| f.name == name)?;
        self.changed = true;
        Some(field)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
        }
    }
}
