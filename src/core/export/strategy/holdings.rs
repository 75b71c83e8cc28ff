//! Holdings export
//!
//! Same shape as the instance export: stored MARC holdings first when the
//! profile allows it, then on-the-fly generation from holdings JSON with the
//! holdings' items attached.

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
pub struct HoldingsStrategy;

#[async_trait]
impl ExportStrategy for HoldingsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Holdings
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
            let loaded = ctx.provider.load_marc_by_ids(SourceKind::Holdings, ids).await?;
            for (source, found) in group_by_external_id(loaded.records) {
                let record_id = source.external_id.to_string();
                let affected = AffectedRecord::new(&record_id, RecordType::Holdings)
                    .with_link(&ctx.links.inventory_base_url);
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
            loaded.ids_without_source
        } else {
            ids.to_vec()
        };

        if without_source.is_empty() {
            return Ok(());
        }

        let loaded = ctx.provider.load_holdings_by_ids(&without_source).await?;
        for id in &loaded.ids_not_found {
            log_record_failure!(id, ErrorCode::RecordNotFound, "no holdings record");
        }
        stats.add_not_found(&loaded.ids_not_found);

        let items = if ctx.engine.profile().needs_items() {
            let items = ctx
                .provider
                .load_items_by_holding_ids(&ids_of(&loaded.records))
                .await?;
            group_by_parent(items, "holdingsRecordId")
        } else {
            Default::default()
        };

        for holdings in loaded.records {
            let record_id = holdings
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let affected = AffectedRecord::from_source(
                &holdings,
                RecordType::Holdings,
                &ctx.links.inventory_base_url,
            );
            let composite = json!({
                "holdings": holdings,
                "items": items.get(&record_id).cloned().unwrap_or_default(),
            });

            match ctx.engine.transform_as(&composite, RecordType::Holdings) {
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
