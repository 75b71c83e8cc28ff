//! Authority export
//!
//! Authorities are exported from stored MARC, falling back to generation from
//! authority JSON. A record's deletion flag must match the profile: a
//! deleted-records profile exports only authorities set for deletion, every
//! other profile only active ones. A mismatch fails that record alone.

use super::{
    group_by_external_id, record_field_errors, record_transform_failure, write_marc,
    ExportContext, ExportStrategy, StrategyKind,
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
pub struct AuthorityStrategy;

/// Reject a record whose deletion flag does not match the profile
fn check_deletion(
    deleted: bool,
    profile_deleted_records: bool,
    record_id: &str,
    affected: &AffectedRecord,
    stats: &mut ExportStatistics,
) -> bool {
    let code = match (deleted, profile_deleted_records) {
        (true, false) => ErrorCode::DeletedAuthorityNotAllowed,
        (false, true) => ErrorCode::ActiveAuthorityNotAllowed,
        _ => return true,
    };
    log_record_failure!(record_id, code, "deletion flag does not match profile");
    stats.add_failed(
        RecordFailure::new(code, vec![record_id.to_string()])
            .with_affected_record(Some(affected.clone())),
    );
    false
}

#[async_trait]
impl ExportStrategy for AuthorityStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Authority
    }

    async fn export_batch(
        &self,
        ids: &[RecordId],
        ctx: &ExportContext,
        writer: &mut LocalStorageWriter,
        stats: &mut ExportStatistics,
    ) -> Result<()> {
        let deleted_profile = ctx.engine.profile().deleted_records;

        let loaded = ctx.provider.load_marc_by_ids(SourceKind::Authority, ids).await?;
        for (source, found) in group_by_external_id(loaded.records) {
            let record_id = source.external_id.to_string();
            let affected = AffectedRecord::new(&record_id, RecordType::Authority)
                .with_link(&ctx.links.inventory_base_url);

            if !check_deletion(source.deleted, deleted_profile, &record_id, &affected, stats) {
                continue;
            }

            match parse_marc_json(&source.content) {
                Ok(record) => {
                    if write_marc(&record, &record_id, Some(affected), writer, stats)? {
                        stats.add_duplicates(&record_id, found);
                    }
                }
                Err(e) => {
                    log_record_failure!(record_id, ErrorCode::RecordTransformation, e);
                    stats.add_failed(
                        RecordFailure::new(
                            ErrorCode::RecordTransformation,
                            vec![record_id.clone(), e.to_string()],
                        )
                        .with_affected_record(Some(affected)),
                    );
                }
            }
        }

        if loaded.ids_without_source.is_empty() {
            return Ok(());
        }

        let catalog = ctx
            .provider
            .load_authorities_by_ids(&loaded.ids_without_source)
            .await?;
        for id in &catalog.ids_not_found {
            log_record_failure!(id, ErrorCode::RecordNotFound, "no authority record");
        }
        stats.add_not_found(&catalog.ids_not_found);

        for authority in catalog.records {
            let record_id = authority
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let affected = AffectedRecord::new(&record_id, RecordType::Authority)
                .with_link(&ctx.links.inventory_base_url);
            let deleted = authority
                .get("deleted")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !check_deletion(deleted, deleted_profile, &record_id, &affected, stats) {
                continue;
            }

            let composite = json!({ "authority": authority });
            match ctx.engine.transform_as(&composite, RecordType::Authority) {
                Ok(outcome) => {
                    record_field_errors(stats, &record_id, outcome.field_errors, Some(&affected));
                    write_marc(&outcome.record, &record_id, Some(affected), writer, stats)?;
                }
                Err(e) => record_transform_failure(stats, &record_id, &e, Some(affected)),
            }
        }

        Ok(())
    }
}
