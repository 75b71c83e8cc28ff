//! Record provider contract
//!
//! The provider is the only way the pipeline reaches the source catalog.
//! Callers split identifier lists into sub-batches before calling; the
//! provider is expected to be stateless and safe to call concurrently.

use crate::domain::file::IdRange;
use crate::domain::ids::RecordId;
use crate::domain::record::{LoadedMarc, LoadedRecords};
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Kinds of catalog record that can be enumerated or carry MARC sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Instance,
    Holdings,
    Authority,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Instance => f.write_str("instance"),
            SourceKind::Holdings => f.write_str("holdings"),
            SourceKind::Authority => f.write_str("authority"),
        }
    }
}

/// Source of raw catalog records
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Load stored MARC records describing the given catalog records
    ///
    /// Identifiers with no stored MARC record are returned in
    /// `ids_without_source`. More than one MARC record may come back for the
    /// same catalog identifier.
    async fn load_marc_by_ids(&self, kind: SourceKind, ids: &[RecordId]) -> Result<LoadedMarc>;

    /// Load instance JSON records
    async fn load_catalog_records_by_ids(&self, ids: &[RecordId]) -> Result<LoadedRecords>;

    /// Load every holdings record attached to the given instances
    async fn load_holdings_by_instance_ids(&self, instance_ids: &[RecordId]) -> Result<Vec<Value>>;

    /// Load every item attached to the given holdings
    async fn load_items_by_holding_ids(&self, holding_ids: &[RecordId]) -> Result<Vec<Value>>;

    /// Load holdings JSON records
    async fn load_holdings_by_ids(&self, ids: &[RecordId]) -> Result<LoadedRecords>;

    /// Load authority JSON records
    async fn load_authorities_by_ids(&self, ids: &[RecordId]) -> Result<LoadedRecords>;

    /// Page through identifiers of one kind inside `range`
    ///
    /// Returns at most `limit` identifiers strictly greater than `after`, in
    /// ascending order. An empty page means the range is exhausted.
    async fn list_ids_in_range(
        &self,
        kind: SourceKind,
        range: &IdRange,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<RecordId>>;
}
