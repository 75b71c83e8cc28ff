//! Export strategies
//!
//! A strategy turns the identifiers of one partition into output records.
//! The partition loop itself is shared ([`export_partition`]): explicit id
//! lists are validated and cut into provider-sized batches, id ranges are
//! paged through the provider. Each strategy only implements what happens to
//! one batch.

pub mod authority;
pub mod factory;
pub mod holdings;
pub mod instance;
pub mod linked_data;

pub use authority::AuthorityStrategy;
pub use factory::{create_strategy, select_strategy, ExportScope, StrategyKind};
pub use holdings::HoldingsStrategy;
pub use instance::InstanceStrategy;
pub use linked_data::LinkedDataStrategy;

use super::summary::{ExportStatistics, RecordFailure};
use super::writer::LocalStorageWriter;
use crate::adapters::provider::{RecordProvider, SourceKind};
use crate::config::LinksConfig;
use crate::core::transform::{FieldError, TransformationEngine};
use crate::domain::{
    AffectedRecord, ErrorCode, ExportFile, JobId, MarcError, MarcSourceRecord, PartitionScope,
    RecordId, Result, TransformError,
};
use crate::log_record_failure;
use crate::marc::{encode, MarcRecord};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Everything a strategy needs besides the partition itself
///
/// Shared read-only by every partition of a job.
#[derive(Clone)]
pub struct ExportContext {
    pub job_id: JobId,
    pub provider: Arc<dyn RecordProvider>,
    pub engine: Arc<TransformationEngine>,
    /// Identifiers per provider call
    pub batch_size: usize,
    pub links: LinksConfig,
}

/// One export strategy
#[async_trait]
pub trait ExportStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Export one batch of identifiers into `writer`
    ///
    /// Per-record problems are recorded in `stats`. An error return fails the
    /// whole partition.
    async fn export_batch(
        &self,
        ids: &[RecordId],
        ctx: &ExportContext,
        writer: &mut LocalStorageWriter,
        stats: &mut ExportStatistics,
    ) -> Result<()>;
}

/// Run `strategy` over every identifier of `file`
///
/// # Errors
///
/// Returns the first provider, transformation setup or writer error; the
/// caller marks the partition failed.
pub async fn export_partition(
    strategy: &dyn ExportStrategy,
    file: &ExportFile,
    ctx: &ExportContext,
    writer: &mut LocalStorageWriter,
) -> Result<ExportStatistics> {
    let mut stats = ExportStatistics::new();
    let batch_size = ctx.batch_size.max(1);

    match &file.scope {
        PartitionScope::Ids { ids } => {
            let mut seen = HashSet::new();
            let mut valid = Vec::with_capacity(ids.len());
            for raw in ids {
                match raw.trim().parse::<RecordId>() {
                    Ok(id) if seen.insert(id) => valid.push(id),
                    // repeats were already logged when the request was planned
                    Ok(_) => {}
                    Err(_) => {
                        log_record_failure!(raw, ErrorCode::InvalidUuidFormat, "not a UUID");
                        stats.add_invalid_id(raw.clone());
                    }
                }
            }

            for (n, batch) in valid.chunks(batch_size).enumerate() {
                strategy.export_batch(batch, ctx, writer, &mut stats).await?;
                tracing::debug!(
                    job_id = %ctx.job_id,
                    file_id = %file.id,
                    batch = n + 1,
                    size = batch.len(),
                    exported = stats.exported,
                    "Batch exported"
                );
            }
        }
        PartitionScope::Range(range) => {
            let kind = strategy.kind().source_kind();
            let mut after = None;
            let mut pages = 0usize;
            loop {
                let ids = ctx
                    .provider
                    .list_ids_in_range(kind, range, after, batch_size)
                    .await?;
                let Some(last) = ids.last().copied() else {
                    break;
                };
                strategy.export_batch(&ids, ctx, writer, &mut stats).await?;
                pages += 1;
                tracing::debug!(
                    job_id = %ctx.job_id,
                    file_id = %file.id,
                    page = pages,
                    size = ids.len(),
                    exported = stats.exported,
                    "Page exported"
                );
                if ids.len() < batch_size {
                    break;
                }
                after = Some(last);
            }
        }
    }

    Ok(stats)
}

/// Encode `record` and append it to the partition file
///
/// Returns `false` when the record was rejected as too long or malformed;
/// the failure is already counted.
///
/// # Errors
///
/// Returns writer errors only.
pub(crate) fn write_marc(
    record: &MarcRecord,
    record_id: &str,
    affected: Option<AffectedRecord>,
    writer: &mut LocalStorageWriter,
    stats: &mut ExportStatistics,
) -> Result<bool> {
    match encode(record) {
        Ok(bytes) => {
            writer.write(&bytes)?;
            stats.add_exported();
            Ok(true)
        }
        Err(e @ (MarcError::RecordTooLong(_) | MarcError::FieldTooLong { .. })) => {
            log_record_failure!(record_id, ErrorCode::RecordTooLong, e);
            stats.add_failed(
                RecordFailure::new(ErrorCode::RecordTooLong, vec![record_id.to_string()])
                    .with_affected_record(affected),
            );
            Ok(false)
        }
        Err(e) => {
            log_record_failure!(record_id, ErrorCode::RecordTransformation, e);
            stats.add_failed(
                RecordFailure::new(
                    ErrorCode::RecordTransformation,
                    vec![record_id.to_string(), e.to_string()],
                )
                .with_affected_record(affected),
            );
            Ok(false)
        }
    }
}

/// Count a record that could not be transformed at all
pub(crate) fn record_transform_failure(
    stats: &mut ExportStatistics,
    record_id: &str,
    error: &TransformError,
    affected: Option<AffectedRecord>,
) {
    log_record_failure!(record_id, ErrorCode::RecordTransformation, error);
    stats.add_failed(
        RecordFailure::new(
            ErrorCode::RecordTransformation,
            vec![record_id.to_string(), error.to_string()],
        )
        .with_affected_record(affected),
    );
}

/// Log field-level failures of a record that is still exported
pub(crate) fn record_field_errors(
    stats: &mut ExportStatistics,
    record_id: &str,
    errors: Vec<FieldError>,
    affected: Option<&AffectedRecord>,
) {
    for error in errors {
        log_record_failure!(record_id, ErrorCode::FieldTransformation, error.reason);
        stats.add_warning(
            RecordFailure::new(
                ErrorCode::FieldTransformation,
                vec![
                    record_id.to_string(),
                    error.field_id,
                    error.value,
                    error.reason,
                ],
            )
            .with_affected_record(affected.cloned()),
        );
    }
}

/// Group stored MARC records by the catalog record they describe
///
/// Groups keep the provider's order; each carries the first record and the
/// number of records found for that identifier.
pub(crate) fn group_by_external_id(
    records: Vec<MarcSourceRecord>,
) -> Vec<(MarcSourceRecord, usize)> {
    let mut index: HashMap<RecordId, usize> = HashMap::new();
    let mut groups: Vec<(MarcSourceRecord, usize)> = Vec::new();
    for record in records {
        match index.get(&record.external_id) {
            Some(&i) => groups[i].1 += 1,
            None => {
                index.insert(record.external_id, groups.len());
                groups.push((record, 1));
            }
        }
    }
    groups
}

/// Group JSON records by the string value of `key`
pub(crate) fn group_by_parent(records: Vec<Value>, key: &str) -> HashMap<String, Vec<Value>> {
    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
    for record in records {
        if let Some(parent) = record.get(key).and_then(Value::as_str) {
            groups.entry(parent.to_string()).or_default().push(record);
        }
    }
    groups
}

/// Identifiers of JSON records, skipping records without a valid id
pub(crate) fn ids_of(records: &[Value]) -> Vec<RecordId> {
    records
        .iter()
        .filter_map(crate::domain::record::record_id_of)
        .collect()
}

impl StrategyKind {
    /// Catalog record kind enumerated for entire-collection exports
    pub fn source_kind(&self) -> SourceKind {
        match self {
            StrategyKind::Instance | StrategyKind::LinkedData => SourceKind::Instance,
            StrategyKind::Holdings => SourceKind::Holdings,
            StrategyKind::Authority => SourceKind::Authority,
        }
    }
}
