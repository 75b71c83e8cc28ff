//! Domain models and types for marcport.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`JobId`], [`FileId`], [`RecordId`])
//! - **Export models** ([`Job`], [`ExportFile`], [`MappingProfile`], [`ExportRequest`])
//! - **Error log entries** ([`ErrorLogEntry`], [`ErrorCode`], [`AffectedRecord`])
//! - **Error types** ([`ExportError`] and its layer-specific variants)
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers are newtypes so a file id can never be passed where a job id is
//! expected:
//!
//! ```rust
//! use marcport::domain::{JobId, RecordId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let job_id = JobId::random();
//! let record_id: RecordId = "7d44b88c-4199-4bad-97dc-d78268e01398".parse()?;
//!
//! // This won't compile
//! // let wrong: JobId = record_id;
//! # Ok(())
//! # }
//! ```

pub mod error_log;
pub mod errors;
pub mod file;
pub mod ids;
pub mod job;
pub mod profile;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use error_log::{AffectedRecord, ErrorCode, ErrorLogEntry};
pub use errors::{ExportError, MarcError, ObjectStorageError, StorageWriterError, TransformError};
pub use file::{ExportFile, FileStatus, IdRange, PartitionScope};
pub use ids::{FileId, JobId, RecordId};
pub use job::{Job, JobBuilder, JobProgress, JobStatus};
pub use profile::{
    validate_file_base_name, ExportRequest, IdType, MappingProfile, RecordType, TransformationRule,
};
pub use record::{LoadedMarc, LoadedRecords, MarcSourceRecord};
pub use result::Result;
