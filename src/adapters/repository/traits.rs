//! Persistence contracts for jobs, partition files and error logs

use crate::domain::error_log::{ErrorCode, ErrorLogEntry};
use crate::domain::file::ExportFile;
use crate::domain::ids::{FileId, JobId};
use crate::domain::job::{Job, JobStatus};
use crate::domain::Result;
use async_trait::async_trait;

/// Job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Reserve the next human-readable job sequence number
    async fn next_hrid(&self) -> Result<u64>;

    async fn create_job(&self, job: &Job) -> Result<()>;

    async fn get_job(&self, job_id: &JobId) -> Result<Option<Job>>;

    /// Replace the stored job
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::NotFound`](crate::domain::ExportError::NotFound)
    /// if the job does not exist.
    async fn update_job(&self, job: &Job) -> Result<()>;

    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>>;
}

/// Partition file persistence
#[async_trait]
pub trait ExportFileRepository: Send + Sync {
    async fn save_files(&self, files: &[ExportFile]) -> Result<()>;

    async fn get_file(&self, file_id: &FileId) -> Result<Option<ExportFile>>;

    async fn update_file(&self, file: &ExportFile) -> Result<()>;

    /// Every partition file of a job, ordered by sequence
    async fn files_for_job(&self, job_id: &JobId) -> Result<Vec<ExportFile>>;
}

/// Error log persistence
#[async_trait]
pub trait ErrorLogRepository: Send + Sync {
    async fn save_entry(&self, entry: ErrorLogEntry) -> Result<()>;

    /// Append values to the `(job_id, code)` entry, creating it if needed
    ///
    /// Values already present are skipped, so replaying the same call leaves the
    /// entry unchanged.
    async fn merge_values(&self, job_id: &JobId, code: ErrorCode, values: &[String]) -> Result<()>;

    async fn entries_for_job(&self, job_id: &JobId) -> Result<Vec<ErrorLogEntry>>;
}
