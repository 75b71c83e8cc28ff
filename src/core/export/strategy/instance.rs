//! Instance export
//!
//! Stored MARC is preferred when the profile is a default one or declares
//! SRS. Instances without stored MARC, and every instance of a custom
//! profile, are transformed on the fly from catalog JSON.

use super::{
    group_by_external_id, group_by_parent, ids_of, record_field_errors, record_transform_failure,
    write_marc, ExportContext, ExportStrategy, StrategyKind,
};
use crate::adapters::provider::SourceKind;
use crate::core::export::summary::{ExportStatistics, RecordFailure};
use crate::core::export::writer::LocalStorageWriter;
use crate::domain::{AffectedRecord, ErrorCode, RecordId, RecordType, Result};
use crate::log_record_failure;
use crate::marc::parse_marc_json;
use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceStrategy;

#[async_trait]
impl ExportStrategy for InstanceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Instance
    }

    async fn export_batch(
        &self,
        ids: &[RecordId],
        ctx: &ExportContext,
        writer: &mut LocalStorageWriter,
        stats: &mut ExportStatistics,
    ) -> Result<()> {
        let profile = ctx.engine.profile();
        let use_stored_marc = profile.is_default || profile.declares(RecordType::Srs);

        let without_source = if use_stored_marc {
            let loaded = ctx.provider.load_marc_by_ids(SourceKind::Instance, ids).await?;
            let related = if appended_types(ctx).is_empty() {
                None
            } else {
                let found: Vec<RecordId> = loaded.records.iter().map(|r| r.external_id).collect();
                Some(load_related(ctx, &found).await?)
            };

            for (source, found) in group_by_external_id(loaded.records) {
                let record_id = source.external_id.to_string();
                let affected = AffectedRecord::new(&record_id, RecordType::Instance)
                    .with_link(&ctx.links.inventory_base_url);

                let mut record = match parse_marc_json(&source.content) {
                    Ok(record) => record,
                    Err(e) => {
                        log_record_failure!(record_id, ErrorCode::RecordTransformation, e);
                        stats.add_failed(
                            RecordFailure::new(
                                ErrorCode::RecordTransformation,
                                vec![record_id.clone(), e.to_string()],
                            )
                            .with_affected_record(Some(affected)),
                        );
                        continue;
                    }
                };

                if let Some(related) = &related {
                    let composite = related.composite_for(&record_id, json!({ "id": record_id }));
                    let errors =
                        ctx.engine
                            .append_fields(&mut record, &composite, &appended_types(ctx));
                    record_field_errors(stats, &record_id, errors, Some(&affected));
                }

                // too-long records are failures; their duplicates are not counted
                if write_marc(&record, &record_id, Some(affected), writer, stats)? {
                    stats.add_duplicates(&record_id, found);
                }
            }
            loaded.ids_without_source
        } else {
            ids.to_vec()
        };

        if without_source.is_empty() {
            return Ok(());
        }

        let loaded = ctx.provider.load_catalog_records_by_ids(&without_source).await?;
        for id in &loaded.ids_not_found {
            log_record_failure!(id, ErrorCode::RecordNotFound, "no instance record");
        }
        stats.add_not_found(&loaded.ids_not_found);

        let related = if ctx.engine.profile().needs_holdings() {
            Some(load_related(ctx, &ids_of(&loaded.records)).await?)
        } else {
            None
        };

        for instance in loaded.records {
            let record_id = instance
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let affected = AffectedRecord::from_source(
                &instance,
                RecordType::Instance,
                &ctx.links.inventory_base_url,
            );

            let composite = match &related {
                Some(related) => related.composite_for(&record_id, instance),
                None => json!({ "instance": instance }),
            };

            match ctx.engine.transform_as(&composite, RecordType::Instance) {
                Ok(outcome) => {
                    record_field_errors(stats, &record_id, outcome.field_errors, affected.as_ref());
                    write_marc(&outcome.record, &record_id, affected, writer, stats)?;
                }
                Err(e) => record_transform_failure(stats, &record_id, &e, affected),
            }
        }

        Ok(())
    }
}

/// Record types whose rules are appended onto stored MARC
fn appended_types(ctx: &ExportContext) -> Vec<RecordType> {
    let profile = ctx.engine.profile();
    [RecordType::Holdings, RecordType::Item]
        .into_iter()
        .filter(|t| profile.declares(*t) && profile.rules.iter().any(|r| r.record_type == *t))
        .collect()
}

/// Holdings and items of a batch of instances
struct Related {
    holdings: std::collections::HashMap<String, Vec<Value>>,
    items: std::collections::HashMap<String, Vec<Value>>,
}

impl Related {
    /// Composite source for one instance
    fn composite_for(&self, instance_id: &str, instance: Value) -> Value {
        let holdings = self.holdings.get(instance_id).cloned().unwrap_or_default();
        let items: Vec<Value> = holdings
            .iter()
            .filter_map(|h| h.get("id").and_then(Value::as_str))
            .filter_map(|holding_id| self.items.get(holding_id))
            .flatten()
            .cloned()
            .collect();
        json!({ "instance": instance, "holdings": holdings, "items": items })
    }
}

async fn load_related(ctx: &ExportContext, instance_ids: &[RecordId]) -> Result<Related> {
    let holdings = ctx.provider.load_holdings_by_instance_ids(instance_ids).await?;
    let items = if ctx.engine.profile().needs_items() {
        ctx.provider
            .load_items_by_holding_ids(&ids_of(&holdings))
            .await?
    } else {
        Vec::new()
    };
    Ok(Related {
        holdings: group_by_parent(holdings, "instanceId"),
        items: group_by_parent(items, "holdingsRecordId"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::provider::InMemoryRecordProvider;
    use crate::config::LinksConfig;
    use crate::core::reference_data::ReferenceDataCache;
    use crate::core::transform::{compile_profile, TransformationEngine};
    use crate::domain::{JobId, MappingProfile, MarcSourceRecord};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn id(n: u128) -> RecordId {
        RecordId::from_u128(n)
    }

    fn instance(n: u128, title: &str) -> Value {
        json!({"id": id(n).to_string(), "hrid": format!("in{n}"), "title": title})
    }

    fn stored(n: u128, external: u128) -> MarcSourceRecord {
        MarcSourceRecord {
            id: id(n),
            external_id: id(external),
            content: json!({
                "leader": "00000nam a2200000 a 4500",
                "fields": [
                    {"001": format!("srs{n}")},
                    {"245": {"ind1": "1", "ind2": "0", "subfields": [{"a": "Stored title"}]}}
                ]
            }),
            deleted: false,
        }
    }

    fn context(provider: InMemoryRecordProvider, profile: &MappingProfile) -> ExportContext {
        let engine = TransformationEngine::new(
            Arc::new(compile_profile(profile).unwrap()),
            Arc::new(ReferenceDataCache::default()),
        );
        ExportContext {
            job_id: JobId::random(),
            provider: Arc::new(provider),
            engine: Arc::new(engine),
            batch_size: 50,
            links: LinksConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_stored_marc_with_fallback_and_duplicates() {
        let provider = InMemoryRecordProvider::new()
            .with_instance(instance(2, "Generated"))
            .unwrap()
            .with_marc(SourceKind::Instance, stored(100, 1))
            .with_marc(SourceKind::Instance, stored(101, 1));
        let ctx = context(provider, &MappingProfile::default_instance());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mrc");
        let mut writer = LocalStorageWriter::open(&path, 1024).unwrap();
        let mut stats = ExportStatistics::new();

        InstanceStrategy
            .export_batch(&[id(1), id(2), id(3)], &ctx, &mut writer, &mut stats)
            .await
            .unwrap();
        writer.close().unwrap();

        assert_eq!(stats.exported, 2);
        assert_eq!(stats.duplicated_srs, 1);
        assert_eq!(stats.not_found, vec![id(3).to_string()]);
        assert_eq!(stats.failed, 1);

        let bytes = std::fs::read(&path).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("srs100"));
        assert!(!text.contains("srs101"));
        assert!(text.contains("Generated"));
    }

    #[tokio::test]
    async fn test_custom_profile_ignores_stored_marc() {
        let mut profile = MappingProfile::default_instance();
        profile.is_default = false;
        let provider = InMemoryRecordProvider::new()
            .with_instance(instance(1, "From JSON"))
            .unwrap()
            .with_marc(SourceKind::Instance, stored(100, 1));
        let ctx = context(provider, &profile);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mrc");
        let mut writer = LocalStorageWriter::open(&path, 1024).unwrap();
        let mut stats = ExportStatistics::new();
        InstanceStrategy
            .export_batch(&[id(1)], &ctx, &mut writer, &mut stats)
            .await
            .unwrap();
        writer.close().unwrap();

        let text = String::from_utf8_lossy(&std::fs::read(&path).unwrap()).to_string();
        assert!(text.contains("From JSON"));
        assert!(!text.contains("srs100"));
    }

    #[tokio::test]
    async fn test_too_long_record_fails_without_duplicate_count() {
        let huge = "x".repeat(9_000);
        let mut fields = vec![json!({"001": "big"})];
        for _ in 0..12 {
            fields.push(json!({"500": {"ind1": " ", "ind2": " ", "subfields": [{"a": huge}]}}));
        }
        let content = json!({"leader": "00000nam a2200000 a 4500", "fields": fields});
        let mut first = stored(100, 1);
        first.content = content;

        let provider = InMemoryRecordProvider::new()
            .with_marc(SourceKind::Instance, first)
            .with_marc(SourceKind::Instance, stored(101, 1));
        let ctx = context(provider, &MappingProfile::default_instance());

        let dir = TempDir::new().unwrap();
        let mut writer = LocalStorageWriter::open(dir.path().join("out.mrc"), 1024).unwrap();
        let mut stats = ExportStatistics::new();
        InstanceStrategy
            .export_batch(&[id(1)], &ctx, &mut writer, &mut stats)
            .await
            .unwrap();

        assert_eq!(stats.exported, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.duplicated_srs, 0);
        assert_eq!(stats.record_errors[0].code, ErrorCode::RecordTooLong);
        writer.discard();
    }
}
