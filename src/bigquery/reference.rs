//! Dataset and table identities

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetReference {
    pub fn new(project_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
        }
    }

    pub fn table(&self, table_id: impl Into<String>) -> TableReference {
        TableReference {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for DatasetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.dataset_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReference {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    /// Parse `project:dataset.table`, `dataset.table`, or `table`; missing
    /// parts are taken from `default`.
    pub fn parse(s: &str, default: &TableReference) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidArgument("table reference is missing".to_string()));
        }

        let (project, rest) = match s.split_once(':') {
            Some((project, rest)) => (Some(project), rest),
            None => (None, s),
        };
        let (dataset, table) = match rest.split_once('.') {
            Some((dataset, table)) => (Some(dataset), table),
            None => (None, rest),
        };

        let reference = Self {
            project_id: project.unwrap_or(&default.project_id).to_string(),
            dataset_id: dataset.unwrap_or(&default.dataset_id).to_string(),
            table_id: table.to_string(),
        };

        if reference.project_id.is_empty()
            || reference.dataset_id.is_empty()
            || reference.table_id.is_empty()
        {
            return Err(Error::InvalidArgument(format!(
                "invalid table reference: {}",
                s
            )));
        }
        Ok(reference)
    }

    pub fn dataset(&self) -> DatasetReference {
        DatasetReference::new(self.project_id.clone(), self.dataset_id.clone())
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{}",
            self.project_id, self.dataset_id, self.table_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_ref() -> TableReference {
        TableReference::new("my-project", "my_dataset", "my_table")
    }

    #[test]
    fn test_parse_full() {
        let r = TableReference::parse("other-project:other_ds.t2", &default_ref()).unwrap();
        assert_eq!(r, TableReference::new("other-project", "other_ds", "t2"));
    }

    #[test]
    fn test_parse_dataset_and_table() {
        let r = TableReference::parse("other_ds.t2", &default_ref()).unwrap();
        assert_eq!(r, TableReference::new("my-project", "other_ds", "t2"));
    }

    #[test]
    fn test_parse_table_only() {
        let r = TableReference::parse("t2", &default_ref()).unwrap();
        assert_eq!(r, TableReference::new("my-project", "my_dataset", "t2"));
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(TableReference::parse("", &default_ref()).is_err());
        assert!(TableReference::parse("ds.", &default_ref()).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(default_ref().to_string(), "my-project:my_dataset.my_table");
        assert_eq!(
            default_ref().dataset().to_string(),
            "my-project:my_dataset"
        );
    }
}
