//! One page of a list call

use super::representation::value_u64;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Common list options: name prefix, continuation token, and page size
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListOptions {
    /// Only return resources whose names begin with this prefix
    pub prefix: Option<String>,
    /// Token from a previous page
    pub token: Option<String>,
    /// Maximum number of results to return
    pub max: Option<u32>,
}

impl ListOptions {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }
}

/// Items of one page in server order, plus how to get the next one.
///
/// Pagination is explicit: pass [`Page::token`] back in the options of the
/// next list call. No further pages are fetched behind the caller's back.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present iff more results exist
    pub token: Option<String>,
    /// Total result count, when the server reports one
    pub total: Option<u64>,
    /// Common prefixes (object listings with a delimiter)
    pub prefixes: Vec<String>,
}

impl<T> Page<T> {
    /// Build a page from a list response.
    ///
    /// `items_key` names the array of resources and `total_key` the count
    /// field, if the API has one.
    pub fn from_response<F>(
        response: &Value,
        items_key: &str,
        total_key: Option<&str>,
        mut convert: F,
    ) -> Result<Self>
    where
        F: FnMut(Value) -> Result<T>,
    {
        let items = response
            .get(items_key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .cloned()
                    .map(&mut convert)
                    .collect::<Result<Vec<T>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let token = response
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let total = total_key
            .and_then(|key| response.get(key))
            .and_then(value_u64);

        let prefixes = response
            .get("prefixes")
            .and_then(Value::as_array)
            .map(|p| p.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            items,
            token,
            total,
            prefixes,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.token.is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Options that fetch the page after this one, if there is one
    pub fn next_options(&self) -> Option<ListOptions> {
        self.token.as_ref().map(ListOptions::with_token)
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Page<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
