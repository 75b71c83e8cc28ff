//! Reference data sources
//!
//! A reference table is a JSON array of objects, each with an `id`. Tables are
//! fetched once per job by the [`ReferenceDataCache`](crate::core::reference_data::ReferenceDataCache).

use crate::domain::{ExportError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Source of controlled-vocabulary tables
#[async_trait]
pub trait ReferenceDataSource: Send + Sync {
    /// Fetch every row of `table`
    ///
    /// An unknown table yields an empty list rather than an error.
    async fn fetch_table(&self, table: &str) -> Result<Vec<Value>>;
}

/// Reads `{dir}/{table}.json`
#[derive(Debug, Clone)]
pub struct DirectoryReferenceSource {
    dir: PathBuf,
}

impl DirectoryReferenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ReferenceDataSource for DirectoryReferenceSource {
    async fn fetch_table(&self, table: &str) -> Result<Vec<Value>> {
        if table.contains(['/', '\\']) || table.contains("..") {
            return Err(ExportError::Validation(format!(
                "Invalid reference table name: {table}"
            )));
        }
        let path = self.dir.join(format!("{table}.json"));
        if !tokio::fs::try_exists(&path).await? {
            tracing::warn!(table = %table, path = %path.display(), "Reference table not found");
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Array(rows) => Ok(rows),
            _ => Err(ExportError::Serialization(format!(
                "Reference table {table} must be a JSON array"
            ))),
        }
    }
}

/// Tables held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceSource {
    tables: HashMap<String, Vec<Value>>,
}

impl InMemoryReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }
}

#[async_trait]
impl ReferenceDataSource for InMemoryReferenceSource {
    async fn fetch_table(&self, table: &str) -> Result<Vec<Value>> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_directory_source_reads_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("locations.json"),
            json!([{"id": "l1", "name": "Main"}]).to_string(),
        )
        .unwrap();

        let source = DirectoryReferenceSource::new(dir.path());
        let rows = source.fetch_table("locations").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(source.fetch_table("materialTypes").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_source_rejects_traversal() {
        let source = DirectoryReferenceSource::new("/tmp");
        assert!(source.fetch_table("../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_directory_source_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{}").unwrap();
        let source = DirectoryReferenceSource::new(dir.path());
        assert!(source.fetch_table("bad").await.is_err());
    }
}
