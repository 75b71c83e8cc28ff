//! Linked-data export
//!
//! Writes one JSON resource per instance, newline delimited.

use super::{record_transform_failure, ExportContext, ExportStrategy, StrategyKind};
use crate::core::export::summary::ExportStatistics;
use crate::core::export::writer::LocalStorageWriter;
use crate::core::transform::to_linked_data;
use crate::domain::{AffectedRecord, ErrorCode, RecordId, RecordType, Result};
use crate::log_record_failure;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkedDataStrategy;

#[async_trait]
impl ExportStrategy for LinkedDataStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LinkedData
    }

    async fn export_batch(
        &self,
        ids: &[RecordId],
        ctx: &ExportContext,
        writer: &mut LocalStorageWriter,
        stats: &mut ExportStatistics,
    ) -> Result<()> {
        let loaded = ctx.provider.load_catalog_records_by_ids(ids).await?;
        for id in &loaded.ids_not_found {
            log_record_failure!(id, ErrorCode::RecordNotFound, "no instance record");
        }
        stats.add_not_found(&loaded.ids_not_found);

        for instance in loaded.records {
            let record_id = instance
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            match to_linked_data(
                &instance,
                ctx.engine.reference_data(),
                &ctx.links.linked_data_base_url,
            ) {
                Ok(resource) => {
                    let mut line = serde_json::to_vec(&resource)?;
                    line.push(b'\n');
                    writer.write(&line)?;
                    stats.add_exported();
                }
                Err(e) => {
                    let affected = AffectedRecord::from_source(
                        &instance,
                        RecordType::Instance,
                        &ctx.links.inventory_base_url,
                    );
                    record_transform_failure(stats, &record_id, &e, affected);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::provider::InMemoryRecordProvider;
    use crate::config::LinksConfig;
    use crate::core::reference_data::ReferenceDataCache;
    use crate::core::transform::{compile_profile, TransformationEngine};
    use crate::domain::{JobId, MappingProfile};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_one_resource_per_line() {
        let provider = InMemoryRecordProvider::new()
            .with_instance(json!({"id": RecordId::from_u128(1).to_string(), "title": "One"}))
            .unwrap()
            .with_instance(json!({"id": RecordId::from_u128(2).to_string(), "title": "Two"}))
            .unwrap();
        let mut profile = MappingProfile::default_instance();
        profile.record_types = vec![RecordType::LinkedData];
        let engine = TransformationEngine::new(
            Arc::new(compile_profile(&profile).unwrap()),
            Arc::new(ReferenceDataCache::default()),
        );
        let ctx = ExportContext {
            job_id: JobId::random(),
            provider: Arc::new(provider),
            engine: Arc::new(engine),
            batch_size: 50,
            links: LinksConfig::default(),
        };

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ld.json");
        let mut writer = LocalStorageWriter::open(&path, 256).unwrap();
        let mut stats = ExportStatistics::new();
        LinkedDataStrategy
            .export_batch(
                &[RecordId::from_u128(1), RecordId::from_u128(2)],
                &ctx,
                &mut writer,
                &mut stats,
            )
            .await
            .unwrap();
        writer.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(stats.exported, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["title"], "Two");
        assert_eq!(lines[0]["@type"], "Instance");
    }
}
