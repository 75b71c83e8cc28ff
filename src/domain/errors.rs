//! Domain error types
//!
//! This module defines the error hierarchy for marcport. Errors are grouped by
//! the layer that raises them so callers can tell a per-record failure from a
//! per-partition or job-level one without inspecting message text.

use thiserror::Error;

/// Main marcport error type
///
/// This is the primary error type used throughout the pipeline.
/// It wraps the layer-specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request or domain object
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local staging file errors
    #[error("Storage writer error: {0}")]
    StorageWriter(#[from] StorageWriterError),

    /// Mapping profile compilation or record transformation errors
    #[error("Transformation error: {0}")]
    Transform(#[from] TransformError),

    /// ISO 2709 encoding errors
    #[error("MARC error: {0}")]
    Marc(#[from] MarcError),

    /// Object storage errors
    #[error("Object storage error: {0}")]
    ObjectStorage(#[from] ObjectStorageError),

    /// Record provider (remote catalog) errors
    #[error("Record provider error: {0}")]
    Provider(String),

    /// Persistence errors for jobs, files and error logs
    #[error("Repository error: {0}")]
    Repository(String),

    /// Entity lookup failures
    #[error("Not found: {0}")]
    NotFound(String),

    /// Every partition of the job produced an empty file
    #[error("Nothing to export for job {job_id}: every export file is empty")]
    EmptyExport {
        /// Job identifier
        job_id: String,
    },

    /// A default mapping profile is required but none was supplied
    #[error("Default mapping profile is missing for record type {0}")]
    DefaultProfileMissing(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl ExportError {
    /// Whether the error is a job-level structural failure
    ///
    /// Structural failures are surfaced to the initiator instead of being folded
    /// into a partition status.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ExportError::EmptyExport { .. } | ExportError::DefaultProfileMissing(_)
        )
    }
}

/// Local storage writer errors
///
/// Raised by the buffered staging sink. Whenever one of these is returned the
/// partial file has already been removed.
#[derive(Debug, Error)]
pub enum StorageWriterError {
    /// The staging file could not be created
    #[error("Failed to create {path}: {reason}")]
    Create { path: String, reason: String },

    /// Appending to the staging file failed
    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    /// Flushing or closing the staging file failed
    #[error("Failed to close {path}: {reason}")]
    Close { path: String, reason: String },

    /// The writer already received the end-of-stream signal
    #[error("Writer for {0} was already discarded")]
    Discarded(String),
}

/// Transformation errors
///
/// Covers illegal rules found while compiling a mapping profile and records
/// that cannot be transformed at all.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The source path of a rule could not be parsed
    #[error("Invalid path '{path}' in rule {field_id}: {reason}")]
    InvalidPath {
        field_id: String,
        path: String,
        reason: String,
    },

    /// The MARC destination of a rule could not be parsed
    #[error("Invalid MARC destination '{destination}' in rule {field_id}")]
    InvalidDestination {
        field_id: String,
        destination: String,
    },

    /// An on-the-fly rule names a field with no built-in default
    #[error("No default rule exists for on-the-fly field {0}")]
    MissingDefaultRule(String),

    /// Unknown value format name
    #[error("Unknown value format '{0}'")]
    UnknownFormat(String),

    /// The source record is structurally unusable
    #[error("Record {record_id} cannot be transformed: {reason}")]
    InvalidRecord { record_id: String, reason: String },
}

/// ISO 2709 encoding errors
#[derive(Debug, Error)]
pub enum MarcError {
    /// Encoded record exceeds the five-digit record length
    #[error("Record length {0} exceeds the 99999 byte MARC limit")]
    RecordTooLong(usize),

    /// Encoded field exceeds the four-digit directory length
    #[error("Field {tag} length {length} exceeds the 9999 byte MARC limit")]
    FieldTooLong { tag: String, length: usize },

    /// Tag is not three alphanumeric characters
    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    /// Leader is malformed
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Source MARC record is malformed
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),
}

/// Object storage errors
#[derive(Debug, Error)]
pub enum ObjectStorageError {
    /// Upload failed
    #[error("Failed to write object {path}: {reason}")]
    Write { path: String, reason: String },

    /// Listing failed
    #[error("Failed to list objects under {prefix}: {reason}")]
    List { prefix: String, reason: String },

    /// Removal failed
    #[error("Failed to remove object {path}: {reason}")]
    Remove { path: String, reason: String },

    /// Object key is not a relative path
    #[error("Invalid object path: {0}")]
    InvalidPath(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from zip archive errors
impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Io(format!("Zip archive error: {err}"))
    }
}
