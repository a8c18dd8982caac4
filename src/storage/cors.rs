//! Bucket CORS configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Deref;

/// Seconds a browser may cache a preflight response, unless a rule says otherwise
pub const DEFAULT_MAX_AGE: i64 = 1800;

/// One CORS rule in the API's shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsRule {
    #[serde(default)]
    pub origin: Vec<String>,
    #[serde(default)]
    pub method: Vec<String>,
    #[serde(default)]
    pub response_header: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<i64>,
    /// Keys this crate does not model, sent back unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single string or a list of strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneOrMany(pub Vec<String>);

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany(vec![value.to_string()])
    }
}

impl From<String> for OneOrMany {
    fn from(value: String) -> Self {
        OneOrMany(vec![value])
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(value: Vec<String>) -> Self {
        OneOrMany(value)
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(value: Vec<&str>) -> Self {
        OneOrMany(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for OneOrMany {
    fn from(value: &[&str]) -> Self {
        OneOrMany(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OneOrMany {
    fn from(value: [&str; N]) -> Self {
        OneOrMany(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Optional parts of a rule added with [`CorsBuilder::add_rule`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorsRuleOptions {
    pub headers: Vec<String>,
    pub max_age: Option<i64>,
}

impl CorsRuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(mut self, headers: impl Into<OneOrMany>) -> Self {
        self.headers = headers.into().0;
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }
}

/// Immutable list of CORS rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cors(Vec<CorsRule>);

impl Cors {
    pub fn new(rules: Vec<CorsRule>) -> Self {
        Self(rules)
    }

    /// Read the rules of a bucket document's `cors` value. A missing or
    /// null value means no rules; anything else must parse.
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            Some(value) if !value.is_null() => Ok(serde_json::from_value(value.clone())?),
            _ => Ok(Self::default()),
        }
    }

    pub fn rules(&self) -> &[CorsRule] {
        &self.0
    }

    pub fn to_builder(&self) -> CorsBuilder {
        CorsBuilder::from_cors(self)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or_else(|_| Value::Array(Vec::new()))
    }
}

impl Deref for Cors {
    type Target = [CorsRule];

    fn deref(&self) -> &[CorsRule] {
        &self.0
    }
}

/// Edits a list of CORS rules.
///
/// The builder starts unmodified; any add, removal or mutable access marks
/// it modified. Only modified builders are sent.
#[derive(Debug, Clone, Default)]
pub struct CorsBuilder {
    rules: Vec<CorsRule>,
    changed: bool,
}

impl CorsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cors(cors: &Cors) -> Self {
        Self {
            rules: cors.0.clone(),
            changed: false,
        }
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Append a rule. Single strings become one-element lists and the max
    /// age defaults to [`DEFAULT_MAX_AGE`].
    pub fn add_rule(
        &mut self,
        origin: impl Into<OneOrMany>,
        methods: impl Into<OneOrMany>,
        options: CorsRuleOptions,
    ) -> &mut Self {
        self.rules.push(CorsRule {
            origin: origin.into().0,
            method: methods.into().0,
            response_header: options.headers,
            max_age_seconds: Some(options.max_age.unwrap_or(DEFAULT_MAX_AGE)),
            extra: Map::new(),
        });
        self.changed = true;
        self
    }

    /// Remove the last rule
    pub fn pop(&mut self) -> Option<CorsRule> {
        let rule = self.rules.pop();
        self.changed |= rule.is_some();
        rule
    }

    pub fn remove(&mut self, index: usize) -> Option<CorsRule> {
        if index >= self.rules.len() {
            return None;
        }
        self.changed = true;
        Some(self.rules.remove(index))
    }

    /// Keep only the rules matching `keep`
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&CorsRule) -> bool,
    {
        let before = self.rules.len();
        self.rules.retain(keep);
        self.changed |= self.rules.len() != before;
    }

    pub fn clear(&mut self) {
        self.changed |= !self.rules.is_empty();
        self.rules.clear();
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CorsRule> {
        let rule = self.rules.get_mut(index)?;
        self.changed = true;
        Some(rule)
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CorsRule> {
        self.changed = true;
        self.rules.iter_mut()
    }

    pub fn rules(&self) -> &[CorsRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn build(self) -> Cors {
        Cors(self.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn existing() -> Cors {
        serde_json::from_value(json!([{
            "maxAgeSeconds": 300,
            "origin": ["http://example.org", "https://example.org"],
            "method": ["*"],
            "responseHeader": ["X-My-Custom-Header"]
        }]))
        .unwrap()
    }

    #[test]
    fn test_add_rule_defaults() {
        let mut builder = CorsBuilder::new();
        assert!(!builder.changed());
        builder
            .add_rule("http://example.org", "GET", CorsRuleOptions::new())
            .add_rule(
                ["http://example.org", "https://example.org"],
                ["PUT", "DELETE"],
                CorsRuleOptions::new()
                    .headers(["X-My-Custom-Header"])
                    .max_age(300),
            )
            .add_rule(
                "http://example.com",
                "*",
                CorsRuleOptions::new().headers("X-Another-Custom-Header"),
            );
        assert!(builder.changed());

        let cors = builder.build();
        assert_eq!(
            cors.to_value(),
            json!([
                {"origin": ["http://example.org"], "method": ["GET"], "responseHeader": [], "maxAgeSeconds": 1800},
                {"origin": ["http://example.org", "https://example.org"], "method": ["PUT", "DELETE"],
                 "responseHeader": ["X-My-Custom-Header"], "maxAgeSeconds": 300},
                {"origin": ["http://example.com"], "method": ["*"],
                 "responseHeader": ["X-Another-Custom-Header"], "maxAgeSeconds": 1800}
            ])
        );
    }

    #[test]
    fn test_edit_existing_rules() {
        let mut builder = existing().to_builder();
        assert!(!builder.changed());
        builder.add_rule("http://example.net", "GET", CorsRuleOptions::new());
        builder.add_rule("http://example.net", "POST", CorsRuleOptions::new());
        builder.pop();
        builder.retain(|r| !r.origin.iter().any(|o| o == "http://example.org"));

        let cors = builder.build();
        assert_eq!(cors.len(), 1);
        assert_eq!(cors[0].origin, vec!["http://example.net"]);
        assert_eq!(cors[0].method, vec!["GET"]);
        assert_eq!(cors[0].max_age_seconds, Some(1800));
    }

    #[test]
    fn test_mutable_access_marks_changed() {
        let mut builder = existing().to_builder();
        if let Some(rule) = builder.get_mut(0) {
            rule.max_age_seconds = Some(600);
            rule.method = vec!["PUT".to_string()];
        }
        assert!(builder.changed());
        assert_eq!(builder.rules()[0].max_age_seconds, Some(600));

        let mut builder = existing().to_builder();
        assert!(builder.get_mut(5).is_none());
        assert!(builder.remove(5).is_none());
        builder.retain(|_| true);
        assert!(!builder.changed());
    }

    #[test]
    fn test_unknown_keys_survive() {
        let cors: Cors = serde_json::from_value(json!([{"origin": ["*"], "futureKey": 1}])).unwrap();
        assert_eq!(cors.to_value()[0]["futureKey"], 1);
        assert!(Cors::from_value(None).unwrap().is_empty());
        assert!(Cors::from_value(Some(&Value::Null)).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_rules_are_an_error() {
        assert!(Cors::from_value(Some(&json!({"origin": "*"}))).is_err());
        assert!(Cors::from_value(Some(&json!([{"origin": 5}]))).is_err());
    }
}
