//! Reference data cache
//!
//! Loaded once per job and shared read-only by every partition of that job.
//! Tables are indexed by row `id`.

use crate::adapters::reference::ReferenceDataSource;
use crate::domain::Result;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Indexed controlled-vocabulary tables
#[derive(Debug, Clone, Default)]
pub struct ReferenceDataCache {
    tables: HashMap<String, HashMap<String, Value>>,
}

impl ReferenceDataCache {
    /// Fetch and index `tables` from `source`
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the source. Rows without a string
    /// `id` are skipped.
    pub async fn load<I, S>(source: &dyn ReferenceDataSource, tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = tables.into_iter().map(Into::into).collect();
        let mut cache = Self::default();
        for name in names {
            let rows = source.fetch_table(&name).await?;
            let count = rows.len();
            cache.insert_table(&name, rows);
            tracing::debug!(table = %name, rows = count, "Reference table loaded");
        }
        Ok(cache)
    }

    /// Index `rows` under `name`, replacing any previous table
    pub fn insert_table(&mut self, name: &str, rows: Vec<Value>) {
        let indexed = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id")?.as_str()?.to_string();
                Some((id, row))
            })
            .collect();
        self.tables.insert(name.to_string(), indexed);
    }

    /// Rows of `table` keyed by id
    pub fn get(&self, table: &str) -> Option<&HashMap<String, Value>> {
        self.tables.get(table)
    }

    /// Display field `field` of row `id` in `table`
    pub fn lookup(&self, table: &str, id: &str, field: &str) -> Option<&str> {
        self.tables.get(table)?.get(id)?.get(field)?.as_str()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}
