//! Partial-update documents and batched update scopes

use super::representation::Representation;
use serde_json::{Map, Value};

/// Fields to send in a PATCH request. Only changed fields are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Map<String, Value>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch with a single top-level field
    pub fn field(key: &str, value: impl Into<Value>) -> Self {
        let mut patch = Self::new();
        patch.set(key, value);
        patch
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Set `parent.key`, keeping other pending keys of `parent`
    pub fn set_nested(&mut self, parent: &str, key: &str, value: impl Into<Value>) {
        let entry = self
            .fields
            .entry(parent.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Mutable view over a representation that records changes instead of
/// sending them. Reads see pending changes first.
#[derive(Debug)]
pub struct PatchScope<'a> {
    current: &'a Representation,
    patch: Patch,
}

impl<'a> PatchScope<'a> {
    pub fn new(current: &'a Representation) -> Self {
        Self {
            current,
            patch: Patch::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.patch.set(key, value);
    }

    pub fn set_nested(&mut self, parent: &str, key: &str, value: impl Into<Value>) {
        self.patch.set_nested(parent, key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.patch.get(key) {
            Some(value) => (!value.is_null()).then_some(value),
            None => self.current.get(key),
        }
    }

    pub fn get_nested(&self, parent: &str, key: &str) -> Option<&Value> {
        if let Some(value) = self.patch.get(parent).and_then(|p| p.get(key)) {
            return (!value.is_null()).then_some(value);
        }
        self.current.get(parent).and_then(|p| p.get(key))
    }

    pub fn current(&self) -> &Representation {
        self.current
    }

    pub fn is_changed(&self) -> bool {
        !self.patch.is_empty()
    }

    pub fn into_patch(self) -> Patch {
        self.patch
    }
}
