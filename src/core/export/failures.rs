//! Failure aggregation into the job error log
//!
//! Per-record problems become one entry each. Missing and malformed
//! identifiers are folded into a single growing entry per job and code via
//! [`ErrorLogRepository::merge_values`], so a large id list never floods the
//! log.

use crate::adapters::repository::ErrorLogRepository;
use crate::core::export::summary::ExportStatistics;
use crate::domain::{ErrorCode, ErrorLogEntry, ExportError, ExportFile, FileId, JobId, Result};
use std::sync::Arc;

/// Writes partition outcomes to the error log
#[derive(Clone)]
pub struct FailureAggregator {
    repository: Arc<dyn ErrorLogRepository>,
}

impl FailureAggregator {
    pub fn new(repository: Arc<dyn ErrorLogRepository>) -> Self {
        Self { repository }
    }

    /// Persist everything a finished partition reported
    pub async fn collect(
        &self,
        job_id: &JobId,
        file_id: &FileId,
        stats: &ExportStatistics,
    ) -> Result<()> {
        for failure in &stats.record_errors {
            let mut entry =
                ErrorLogEntry::new(*job_id, failure.code, failure.values.clone()).with_file(*file_id);
            if let Some(record) = &failure.affected_record {
                entry = entry.with_affected_record(record.clone());
            }
            self.repository.save_entry(entry).await?;
        }

        self.repository
            .merge_values(job_id, ErrorCode::RecordNotFound, &stats.not_found)
            .await?;
        self.repository
            .merge_values(job_id, ErrorCode::InvalidUuidFormat, &stats.invalid_ids)
            .await?;

        if !stats.record_errors.is_empty() {
            tracing::debug!(
                job_id = %job_id,
                file_id = %file_id,
                entries = stats.record_errors.len(),
                "Recorded per-record failures"
            );
        }
        Ok(())
    }

    /// Log a partition that failed as a whole
    pub async fn record_partition_failure(
        &self,
        job_id: &JobId,
        file: &ExportFile,
        error: &ExportError,
    ) -> Result<()> {
        let file_name = file
            .file_location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.id.to_string());
        let entry = ErrorLogEntry::new(
            *job_id,
            ErrorCode::PartitionFailed,
            vec![file_name, error.to_string()],
        )
        .with_file(file.id);
        self.repository.save_entry(entry).await
    }

    /// Log identifiers submitted more than once
    pub async fn record_duplicates(&self, job_id: &JobId, duplicates: &[String]) -> Result<()> {
        if duplicates.is_empty() {
            return Ok(());
        }
        let entry = ErrorLogEntry::new(
            *job_id,
            ErrorCode::DuplicateIdentifiers,
            vec![duplicates.len().to_string()],
        );
        self.repository.save_entry(entry).await
    }

    /// Log a job-level structural failure
    pub async fn record_job_failure(
        &self,
        job_id: &JobId,
        code: ErrorCode,
        values: Vec<String>,
    ) -> Result<()> {
        self.repository
            .save_entry(ErrorLogEntry::new(*job_id, code, values))
            .await
    }

    /// Add the closing summaries and return the job's full error log
    pub async fn finalize(&self, job_id: &JobId) -> Result<Vec<ErrorLogEntry>> {
        let entries = self.repository.entries_for_job(job_id).await?;
        let not_found = entries
            .iter()
            .find(|entry| entry.code == ErrorCode::RecordNotFound)
            .map(|entry| entry.values.len())
            .unwrap_or(0);

        if not_found == 0 {
            return Ok(entries);
        }

        self.repository
            .save_entry(ErrorLogEntry::new(
                *job_id,
                ErrorCode::NotFoundSummary,
                vec![not_found.to_string()],
            ))
            .await?;
        self.repository.entries_for_job(job_id).await
    }
}
