//! Mapping profiles and export requests
//!
//! A [`MappingProfile`] is loaded once per job and never changes while the job
//! runs. Its rules are kept here in their raw, user-authored form; they are
//! compiled into a typed representation by
//! [`core::transform::rules`](crate::core::transform::rules).

use crate::domain::ExportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Record types a mapping profile can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Instance,
    Holdings,
    Item,
    Authority,
    /// Pre-existing MARC source records
    Srs,
    LinkedData,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordType::Instance => "INSTANCE",
            RecordType::Holdings => "HOLDINGS",
            RecordType::Item => "ITEM",
            RecordType::Authority => "AUTHORITY",
            RecordType::Srs => "SRS",
            RecordType::LinkedData => "LINKED_DATA",
        };
        f.write_str(s)
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "INSTANCE" => Ok(RecordType::Instance),
            "HOLDINGS" | "HOLDING" => Ok(RecordType::Holdings),
            "ITEM" => Ok(RecordType::Item),
            "AUTHORITY" => Ok(RecordType::Authority),
            "SRS" | "MARC" => Ok(RecordType::Srs),
            "LINKED_DATA" => Ok(RecordType::LinkedData),
            other => Err(format!("Unknown record type: {other}")),
        }
    }
}

/// Explicit identifier type carried by a custom export request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdType {
    Instance,
    Holding,
    Authority,
}

/// One user-authored transformation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationRule {
    /// Stable field identifier, e.g. `instance.title`
    pub field_id: String,

    /// Source path with an optional `| ref:{table}.{field}` suffix
    #[serde(default)]
    pub path: String,

    /// MARC destination such as `245 10$a`; empty for on-the-fly rules
    #[serde(default)]
    pub transformation: String,

    /// Record type the rule reads from
    pub record_type: RecordType,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Take the destination from the built-in rule for the same field id
    #[serde(default)]
    pub on_the_fly: bool,

    /// Optional value format (`marc-timestamp`, `marc-date`)
    #[serde(default)]
    pub format: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Mapping profile: declared record types plus an ordered rule list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingProfile {
    pub id: Uuid,
    pub name: String,

    /// Reserved profiles shipped with the system
    #[serde(default)]
    pub is_default: bool,

    pub record_types: Vec<RecordType>,

    #[serde(default)]
    pub transformations: Vec<TransformationRule>,

    /// Profile exports only authorities flagged for deletion
    #[serde(default)]
    pub deleted_records: bool,
}

impl MappingProfile {
    /// The reserved default instance profile
    pub fn default_instance() -> Self {
        Self {
            id: Uuid::from_u128(0x25d81cbe_9686_11ea_bb37_0242ac130002),
            name: "Default instance mapping profile".to_string(),
            is_default: true,
            record_types: vec![RecordType::Instance],
            transformations: Vec::new(),
            deleted_records: false,
        }
    }

    /// The reserved default holdings profile
    pub fn default_holdings() -> Self {
        Self {
            id: Uuid::from_u128(0x1ef7d0ac_f0a8_42b5_bbbb_c7e249009c13),
            name: "Default holdings mapping profile".to_string(),
            is_default: true,
            record_types: vec![RecordType::Holdings],
            transformations: Vec::new(),
            deleted_records: false,
        }
    }

    /// The reserved default authority profile
    pub fn default_authority() -> Self {
        Self {
            id: Uuid::from_u128(0x5d636597_a59d_4391_a270_4e79d5ba70e3),
            name: "Default authority mapping profile".to_string(),
            is_default: true,
            record_types: vec![RecordType::Authority],
            transformations: Vec::new(),
            deleted_records: false,
        }
    }

    /// Reserved default profile for a record type, if one exists
    pub fn default_for(record_type: RecordType) -> Option<Self> {
        match record_type {
            RecordType::Instance | RecordType::Srs => Some(Self::default_instance()),
            RecordType::Holdings => Some(Self::default_holdings()),
            RecordType::Authority => Some(Self::default_authority()),
            RecordType::Item | RecordType::LinkedData => None,
        }
    }

    pub fn declares(&self, record_type: RecordType) -> bool {
        self.record_types.contains(&record_type)
    }

    /// Rules that take part in transformation
    pub fn enabled_rules(&self) -> impl Iterator<Item = &TransformationRule> {
        self.transformations.iter().filter(|r| r.enabled)
    }
}

/// An accepted export request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Record type the identifiers refer to
    pub record_type: RecordType,

    /// Export the entire collection instead of an id list
    #[serde(default)]
    pub all: bool,

    /// Explicit identifier type of a custom request
    #[serde(default)]
    pub id_type: Option<IdType>,

    /// Submitted identifiers, validated per partition
    #[serde(default)]
    pub ids: Vec<String>,

    /// Base name of the produced artifact
    #[serde(default)]
    pub file_name: Option<String>,

    #[serde(default)]
    pub job_profile_id: Option<Uuid>,

    #[serde(default = "default_created_by")]
    pub created_by: String,
}

fn default_created_by() -> String {
    "system".to_string()
}

impl ExportRequest {
    /// Request for an explicit list of identifiers
    pub fn by_ids(record_type: RecordType, ids: Vec<String>) -> Self {
        Self {
            record_type,
            all: false,
            id_type: None,
            ids,
            file_name: None,
            job_profile_id: None,
            created_by: default_created_by(),
        }
    }

    /// Request for every record of a type
    pub fn entire_collection(record_type: RecordType) -> Self {
        Self {
            all: true,
            ..Self::by_ids(record_type, Vec::new())
        }
    }

    /// Reject requests with nothing to export or an unsafe file name
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Validation`] naming the problem.
    pub fn validate(&self) -> crate::domain::Result<()> {
        if !self.all && self.ids.is_empty() {
            return Err(ExportError::Validation(
                "Export request contains no identifiers".to_string(),
            ));
        }
        if let Some(name) = self.file_name.as_deref().filter(|n| !n.trim().is_empty()) {
            validate_file_base_name(name).map_err(ExportError::Validation)?;
        }
        Ok(())
    }
}

/// Check that `name` is usable as a single file name segment
///
/// Staging and object paths are built as `{dir}/{name}-{seq}.{ext}`, so the
/// name must not contain separators, parent references or control characters.
pub fn validate_file_base_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("file base name cannot be empty".to_string());
    }
    if trimmed.contains(['/', '\\'])
        || trimmed.contains("..")
        || trimmed.chars().any(char::is_control)
    {
        return Err(format!(
            "file base name '{}' must be a plain file name",
            name.escape_debug()
        ));
    }
    Ok(())
}
