//! Source record shapes returned by the record provider

use crate::domain::ids::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pre-existing MARC record stored for a catalog resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarcSourceRecord {
    /// Identifier of the stored MARC record itself
    pub id: RecordId,

    /// Catalog record the MARC record describes
    pub external_id: RecordId,

    /// MARC-in-JSON content
    pub content: Value,

    /// Marked for deletion in the source catalog
    #[serde(default)]
    pub deleted: bool,
}

/// Result of loading MARC source records by catalog identifiers
#[derive(Debug, Clone, Default)]
pub struct LoadedMarc {
    pub records: Vec<MarcSourceRecord>,
    /// Requested identifiers with no stored MARC record
    pub ids_without_source: Vec<RecordId>,
}

/// Result of loading catalog JSON records by identifiers
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: Vec<Value>,
    pub ids_not_found: Vec<RecordId>,
}

/// Read the `id` of a catalog JSON record
pub fn record_id_of(record: &Value) -> Option<RecordId> {
    record.get("id")?.as_str()?.parse().ok()
}
