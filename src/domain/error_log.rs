//! Persisted error log entries
//!
//! Codes are stable machine-readable strings. Identifiers and counts are only
//! ever interpolated into the human-readable template.

use crate::domain::ids::{FileId, JobId};
use crate::domain::profile::RecordType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "error.invalidUuidFormat")]
    InvalidUuidFormat,
    #[serde(rename = "error.recordNotFound")]
    RecordNotFound,
    #[serde(rename = "error.duplicateSrsRecord")]
    DuplicateSrsRecord,
    #[serde(rename = "error.recordTooLong")]
    RecordTooLong,
    #[serde(rename = "error.fieldTransformation")]
    FieldTransformation,
    #[serde(rename = "error.recordTransformation")]
    RecordTransformation,
    #[serde(rename = "error.deletedAuthorityNotAllowed")]
    DeletedAuthorityNotAllowed,
    #[serde(rename = "error.activeAuthorityNotAllowed")]
    ActiveAuthorityNotAllowed,
    #[serde(rename = "error.partitionFailed")]
    PartitionFailed,
    #[serde(rename = "error.emptyExport")]
    EmptyExport,
    #[serde(rename = "error.defaultProfileMissing")]
    DefaultProfileMissing,
    #[serde(rename = "error.duplicateIdentifiers")]
    DuplicateIdentifiers,
    #[serde(rename = "error.notFoundSummary")]
    NotFoundSummary,
}

impl ErrorCode {
    /// Machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidUuidFormat => "error.invalidUuidFormat",
            ErrorCode::RecordNotFound => "error.recordNotFound",
            ErrorCode::DuplicateSrsRecord => "error.duplicateSrsRecord",
            ErrorCode::RecordTooLong => "error.recordTooLong",
            ErrorCode::FieldTransformation => "error.fieldTransformation",
            ErrorCode::RecordTransformation => "error.recordTransformation",
            ErrorCode::DeletedAuthorityNotAllowed => "error.deletedAuthorityNotAllowed",
            ErrorCode::ActiveAuthorityNotAllowed => "error.activeAuthorityNotAllowed",
            ErrorCode::PartitionFailed => "error.partitionFailed",
            ErrorCode::EmptyExport => "error.emptyExport",
            ErrorCode::DefaultProfileMissing => "error.defaultProfileMissing",
            ErrorCode::DuplicateIdentifiers => "error.duplicateIdentifiers",
            ErrorCode::NotFoundSummary => "error.notFoundSummary",
        }
    }

    /// Human-readable template with `{}` placeholders
    pub fn template(&self) -> &'static str {
        match self {
            ErrorCode::InvalidUuidFormat => "Invalid UUID format: {}",
            ErrorCode::RecordNotFound => "Record not found: {}",
            ErrorCode::DuplicateSrsRecord => {
                "{} underlying MARC records found for record {}, only the first one was exported"
            }
            ErrorCode::RecordTooLong => "Record {} exceeds the 99999 byte MARC record length",
            ErrorCode::FieldTransformation => {
                "Record {}: field {} with value '{}' could not be transformed: {}"
            }
            ErrorCode::RecordTransformation => "Record {} could not be transformed: {}",
            ErrorCode::DeletedAuthorityNotAllowed => {
                "Authority {} is set for deletion and cannot be exported with this profile"
            }
            ErrorCode::ActiveAuthorityNotAllowed => {
                "Authority {} is not set for deletion and cannot be exported with a deleted-records profile"
            }
            ErrorCode::PartitionFailed => "Export file {} failed: {}",
            ErrorCode::EmptyExport => "Nothing to export: no export file contains records",
            ErrorCode::DefaultProfileMissing => "Default mapping profile is missing for {}",
            ErrorCode::DuplicateIdentifiers => "{} duplicate identifiers were found",
            ErrorCode::NotFoundSummary => "{} identifiers were not found",
        }
    }

    /// Interpolate `values` into the template in order
    ///
    /// Missing values leave their placeholder empty. Surplus values are joined
    /// into the last placeholder, which is how aggregated entries list every
    /// offending identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use marcport::domain::error_log::ErrorCode;
    ///
    /// let msg = ErrorCode::RecordNotFound.render(&["a".to_string(), "b".to_string()]);
    /// assert_eq!(msg, "Record not found: a, b");
    /// ```
    pub fn render(&self, values: &[String]) -> String {
        let parts: Vec<&str> = self.template().split("{}").collect();
        let slots = parts.len() - 1;
        let mut out = String::new();
        for (i, part) in parts.iter().enumerate() {
            out.push_str(part);
            if i == slots {
                break;
            }
            if i + 1 == slots {
                out.push_str(&values.get(i..).unwrap_or_default().join(", "));
            } else if let Some(value) = values.get(i) {
                out.push_str(value);
            }
        }
        out
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Record a per-record error refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedRecord {
    pub id: String,
    pub hrid: Option<String>,
    pub title: Option<String>,
    pub record_type: RecordType,
    /// Link back to the record in the source catalog
    pub inventory_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_records: Vec<AffectedRecord>,
}

impl AffectedRecord {
    pub fn new(id: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            id: id.into(),
            hrid: None,
            title: None,
            record_type,
            inventory_link: None,
            affected_records: Vec::new(),
        }
    }

    /// Build from a source JSON object, reading `id`, `hrid` and `title`
    pub fn from_source(
        record: &serde_json::Value,
        record_type: RecordType,
        inventory_base_url: &str,
    ) -> Option<Self> {
        let id = record.get("id")?.as_str()?;
        let text = |key: &str| record.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Some(Self {
            hrid: text("hrid"),
            title: text("title"),
            ..Self::new(id, record_type).with_link(inventory_base_url)
        })
    }

    /// Attach the inventory link for this record
    pub fn with_link(mut self, inventory_base_url: &str) -> Self {
        self.inventory_link = Some(format!(
            "{}/inventory/view/{}",
            inventory_base_url.trim_end_matches('/'),
            self.id
        ));
        self
    }

    pub fn with_child(mut self, child: AffectedRecord) -> Self {
        self.affected_records.push(child);
        self
    }
}

/// One persisted error log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: Uuid,
    pub job_id: JobId,
    pub code: ErrorCode,
    /// Values interpolated into the template
    pub values: Vec<String>,
    pub message: String,
    pub affected_record: Option<AffectedRecord>,
    /// Partition the entry was raised for, if any
    pub file_id: Option<FileId>,
    pub created_at: DateTime<Utc>,
}

impl ErrorLogEntry {
    pub fn new(job_id: JobId, code: ErrorCode, values: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            code,
            message: code.render(&values),
            values,
            affected_record: None,
            file_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_affected_record(mut self, record: AffectedRecord) -> Self {
        self.affected_record = Some(record);
        self
    }

    pub fn with_file(mut self, file_id: FileId) -> Self {
        self.file_id = Some(file_id);
        self
    }

    /// Append values not yet present and re-render the message
    ///
    /// Returns the number of values actually added.
    pub fn merge_values(&mut self, values: &[String]) -> usize {
        let mut added = 0;
        for value in values {
            if !self.values.contains(value) {
                self.values.push(value.clone());
                added += 1;
            }
        }
        if added > 0 {
            self.message = self.code.render(&self.values);
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_in_order() {
        let msg = ErrorCode::FieldTransformation.render(&[
            "r1".to_string(),
            "instance.updatedDate".to_string(),
            "yesterday".to_string(),
            "bad date".to_string(),
        ]);
        assert_eq!(
            msg,
            "Record r1: field instance.updatedDate with value 'yesterday' could not be transformed: bad date"
        );
    }

    #[test]
    fn test_render_missing_values() {
        assert_eq!(ErrorCode::RecordNotFound.render(&[]), "Record not found: ");
    }

    #[test]
    fn test_code_serialization_matches_code() {
        let json = serde_json::to_string(&ErrorCode::DuplicateSrsRecord).unwrap();
        assert_eq!(json, format!("\"{}\"", ErrorCode::DuplicateSrsRecord.code()));
    }

    #[test]
    fn test_merge_values_is_idempotent() {
        let mut entry = ErrorLogEntry::new(
            JobId::random(),
            ErrorCode::RecordNotFound,
            vec!["a".to_string()],
        );
        assert_eq!(entry.merge_values(&["a".to_string(), "b".to_string()]), 1);
        assert_eq!(entry.merge_values(&["b".to_string()]), 0);
        assert_eq!(entry.values, vec!["a", "b"]);
    }

    #[test]
    fn test_affected_record_link() {
        let record = serde_json::json!({"id": "i1", "hrid": "in001", "title": "Title"});
        let affected =
            AffectedRecord::from_source(&record, RecordType::Instance, "https://catalog.test/")
                .unwrap();
        assert_eq!(
            affected.inventory_link.as_deref(),
            Some("https://catalog.test/inventory/view/i1")
        );
        assert_eq!(affected.hrid.as_deref(), Some("in001"));
    }
}
