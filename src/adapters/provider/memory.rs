//! In-memory record provider
//!
//! Backs local exports (loaded from a directory of JSON-lines files) and
//! doubles as the provider used by tests.

use super::traits::{RecordProvider, SourceKind};
use crate::domain::file::IdRange;
use crate::domain::ids::RecordId;
use crate::domain::record::{record_id_of, LoadedMarc, LoadedRecords, MarcSourceRecord};
use crate::domain::{ExportError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Record provider holding every record in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordProvider {
    instances: BTreeMap<RecordId, Value>,
    holdings: BTreeMap<RecordId, Value>,
    items: BTreeMap<RecordId, Value>,
    authorities: BTreeMap<RecordId, Value>,
    marc: HashMap<SourceKind, Vec<MarcSourceRecord>>,
}

impl InMemoryRecordProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every known JSON-lines file present in `dir`
    ///
    /// Missing files are treated as empty collections.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be read or a line is not a
    /// JSON object with a UUID `id`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut provider = Self::new();

        for value in read_jsonl(&dir.join("instances.jsonl"))? {
            provider = provider.with_instance(value)?;
        }
        for value in read_jsonl(&dir.join("holdings.jsonl"))? {
            provider = provider.with_holdings(value)?;
        }
        for value in read_jsonl(&dir.join("items.jsonl"))? {
            provider = provider.with_item(value)?;
        }
        for value in read_jsonl(&dir.join("authorities.jsonl"))? {
            provider = provider.with_authority(value)?;
        }
        for (file, kind) in [
            ("marc_bib.jsonl", SourceKind::Instance),
            ("marc_holdings.jsonl", SourceKind::Holdings),
            ("marc_authority.jsonl", SourceKind::Authority),
        ] {
            for value in read_jsonl(&dir.join(file))? {
                let record: MarcSourceRecord = serde_json::from_value(value)?;
                provider = provider.with_marc(kind, record);
            }
        }

        tracing::info!(
            dir = %dir.display(),
            instances = provider.instances.len(),
            holdings = provider.holdings.len(),
            items = provider.items.len(),
            authorities = provider.authorities.len(),
            "Loaded local record source"
        );
        Ok(provider)
    }

    pub fn with_instance(mut self, record: Value) -> Result<Self> {
        let id = require_id(&record)?;
        self.instances.insert(id, record);
        Ok(self)
    }

    pub fn with_holdings(mut self, record: Value) -> Result<Self> {
        let id = require_id(&record)?;
        self.holdings.insert(id, record);
        Ok(self)
    }

    pub fn with_item(mut self, record: Value) -> Result<Self> {
        let id = require_id(&record)?;
        self.items.insert(id, record);
        Ok(self)
    }

    pub fn with_authority(mut self, record: Value) -> Result<Self> {
        let id = require_id(&record)?;
        self.authorities.insert(id, record);
        Ok(self)
    }

    pub fn with_marc(mut self, kind: SourceKind, record: MarcSourceRecord) -> Self {
        self.marc.entry(kind).or_default().push(record);
        self
    }

    fn catalog(&self, kind: SourceKind) -> &BTreeMap<RecordId, Value> {
        match kind {
            SourceKind::Instance => &self.instances,
            SourceKind::Holdings => &self.holdings,
            SourceKind::Authority => &self.authorities,
        }
    }

    fn load_by_ids(map: &BTreeMap<RecordId, Value>, ids: &[RecordId]) -> LoadedRecords {
        let mut loaded = LoadedRecords::default();
        for id in ids {
            match map.get(id) {
                Some(record) => loaded.records.push(record.clone()),
                None => loaded.ids_not_found.push(*id),
            }
        }
        loaded
    }

    fn children_of(map: &BTreeMap<RecordId, Value>, key: &str, parents: &[RecordId]) -> Vec<Value> {
        let parents: BTreeSet<String> = parents.iter().map(|id| id.to_string()).collect();
        map.values()
            .filter(|record| {
                record
                    .get(key)
                    .and_then(Value::as_str)
                    .is_some_and(|parent| parents.contains(parent))
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordProvider for InMemoryRecordProvider {
    async fn load_marc_by_ids(&self, kind: SourceKind, ids: &[RecordId]) -> Result<LoadedMarc> {
        let stored = self.marc.get(&kind).map(Vec::as_slice).unwrap_or_default();
        let mut loaded = LoadedMarc::default();
        for id in ids {
            let matching: Vec<MarcSourceRecord> = stored
                .iter()
                .filter(|record| record.external_id == *id)
                .cloned()
                .collect();
            if matching.is_empty() {
                loaded.ids_without_source.push(*id);
            } else {
                loaded.records.extend(matching);
            }
        }
        Ok(loaded)
    }

    async fn load_catalog_records_by_ids(&self, ids: &[RecordId]) -> Result<LoadedRecords> {
        Ok(Self::load_by_ids(&self.instances, ids))
    }

    async fn load_holdings_by_instance_ids(&self, instance_ids: &[RecordId]) -> Result<Vec<Value>> {
        Ok(Self::children_of(&self.holdings, "instanceId", instance_ids))
    }

    async fn load_items_by_holding_ids(&self, holding_ids: &[RecordId]) -> Result<Vec<Value>> {
        Ok(Self::children_of(&self.items, "holdingsRecordId", holding_ids))
    }

    async fn load_holdings_by_ids(&self, ids: &[RecordId]) -> Result<LoadedRecords> {
        Ok(Self::load_by_ids(&self.holdings, ids))
    }

    async fn load_authorities_by_ids(&self, ids: &[RecordId]) -> Result<LoadedRecords> {
        Ok(Self::load_by_ids(&self.authorities, ids))
    }

    async fn list_ids_in_range(
        &self,
        kind: SourceKind,
        range: &IdRange,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<RecordId>> {
        // Catalog records plus records that only exist as stored MARC
        let mut ids: BTreeSet<RecordId> = self.catalog(kind).keys().copied().collect();
        if let Some(stored) = self.marc.get(&kind) {
            ids.extend(stored.iter().map(|record| record.external_id));
        }

        Ok(ids
            .into_iter()
            .filter(|id| range.contains(id))
            .filter(|id| after.map_or(true, |after| *id > after))
            .take(limit)
            .collect())
    }
}

fn require_id(record: &Value) -> Result<RecordId> {
    record_id_of(record).ok_or_else(|| {
        ExportError::Provider(format!("Source record has no valid id: {record}"))
    })
}

fn read_jsonl(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                ExportError::Provider(format!("{} line {}: {e}", path.display(), n + 1))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(n: u128) -> RecordId {
        RecordId::from_u128(n)
    }

    fn provider() -> InMemoryRecordProvider {
        InMemoryRecordProvider::new()
            .with_instance(json!({"id": id(1).to_string(), "title": "One"}))
            .unwrap()
            .with_instance(json!({"id": id(2).to_string(), "title": "Two"}))
            .unwrap()
            .with_holdings(json!({"id": id(10).to_string(), "instanceId": id(1).to_string()}))
            .unwrap()
            .with_item(json!({"id": id(20).to_string(), "holdingsRecordId": id(10).to_string()}))
            .unwrap()
            .with_marc(
                SourceKind::Instance,
                MarcSourceRecord {
                    id: id(100),
                    external_id: id(3),
                    content: json!({}),
                    deleted: false,
                },
            )
    }

    #[tokio::test]
    async fn test_load_by_ids_reports_missing() {
        let loaded = provider()
            .load_catalog_records_by_ids(&[id(1), id(9)])
            .await
            .unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.ids_not_found, vec![id(9)]);
    }

    #[tokio::test]
    async fn test_children_lookup() {
        let p = provider();
        let holdings = p.load_holdings_by_instance_ids(&[id(1)]).await.unwrap();
        assert_eq!(holdings.len(), 1);
        let items = p.load_items_by_holding_ids(&[id(10)]).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_marc_without_source() {
        let loaded = provider()
            .load_marc_by_ids(SourceKind::Instance, &[id(1), id(3)])
            .await
            .unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.ids_without_source, vec![id(1)]);
    }

    #[tokio::test]
    async fn test_list_ids_keyset_pagination() {
        let p = provider();
        let range = IdRange::full();
        let first = p
            .list_ids_in_range(SourceKind::Instance, &range, None, 2)
            .await
            .unwrap();
        assert_eq!(first, vec![id(1), id(2)]);
        let second = p
            .list_ids_in_range(SourceKind::Instance, &range, Some(id(2)), 2)
            .await
            .unwrap();
        assert_eq!(second, vec![id(3)]);
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("instances.jsonl"),
            format!("{}\n\n{}\n", json!({"id": id(1).to_string()}), json!({"id": id(2).to_string()})),
        )
        .unwrap();
        let p = InMemoryRecordProvider::from_dir(dir.path()).unwrap();
        assert_eq!(p.instances.len(), 2);
        assert!(p.authorities.is_empty());
    }
}
