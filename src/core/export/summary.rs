//! Export statistics and reporting
//!
//! [`ExportStatistics`] is the ephemeral per-partition result. It is folded
//! into the job's progress counters and into error log entries, and never
//! persisted on its own. [`ExportSummary`] is what the coordinator reports
//! for a whole job.

use crate::domain::{AffectedRecord, ErrorCode, FileStatus, JobId, JobStatus};
use std::time::Duration;

/// One per-record problem to be written to the error log
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub code: ErrorCode,
    pub values: Vec<String>,
    pub affected_record: Option<AffectedRecord>,
}

impl RecordFailure {
    pub fn new(code: ErrorCode, values: Vec<String>) -> Self {
        Self {
            code,
            values,
            affected_record: None,
        }
    }

    pub fn with_affected_record(mut self, record: Option<AffectedRecord>) -> Self {
        self.affected_record = record;
        self
    }
}

/// Counters for one partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportStatistics {
    /// Records written to the partition file
    pub exported: u64,

    /// Input identifiers that produced no output
    pub failed: u64,

    /// Extra MARC source records found for an already exported identifier
    pub duplicated_srs: u64,

    /// Identifiers with no source record at all
    pub not_found: Vec<String>,

    /// Identifiers that are not UUIDs
    pub invalid_ids: Vec<String>,

    /// Per-record error log entries
    pub record_errors: Vec<RecordFailure>,
}

impl ExportStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exported(&mut self) {
        self.exported += 1;
    }

    /// Count a record as failed and log why
    pub fn add_failed(&mut self, failure: RecordFailure) {
        self.failed += 1;
        self.record_errors.push(failure);
    }

    /// Log a problem with a record that was still exported
    pub fn add_warning(&mut self, failure: RecordFailure) {
        self.record_errors.push(failure);
    }

    /// Count duplicate MARC source records for one exported identifier
    pub fn add_duplicates(&mut self, record_id: &str, total_found: usize) {
        let extra = total_found.saturating_sub(1);
        if extra == 0 {
            return;
        }
        self.duplicated_srs += extra as u64;
        self.record_errors.push(RecordFailure::new(
            ErrorCode::DuplicateSrsRecord,
            vec![total_found.to_string(), record_id.to_string()],
        ));
    }

    pub fn add_not_found<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        for id in ids {
            self.failed += 1;
            self.not_found.push(id.to_string());
        }
    }

    pub fn add_invalid_id(&mut self, id: impl Into<String>) {
        self.failed += 1;
        self.invalid_ids.push(id.into());
    }

    /// Any per-record failure was seen
    pub fn has_errors(&self) -> bool {
        self.failed > 0 || !self.record_errors.is_empty()
    }

    /// Terminal status of a partition that ran to the end
    ///
    /// A partition that produced no output while reporting errors failed
    /// outright.
    pub fn partition_status(&self) -> FileStatus {
        match (self.exported, self.has_errors()) {
            (_, false) => FileStatus::Completed,
            (0, true) => FileStatus::Failed,
            (_, true) => FileStatus::CompletedWithErrors,
        }
    }

    /// Merge another partition's counters into this one
    pub fn merge(&mut self, other: ExportStatistics) {
        self.exported += other.exported;
        self.failed += other.failed;
        self.duplicated_srs += other.duplicated_srs;
        self.not_found.extend(other.not_found);
        self.invalid_ids.extend(other.invalid_ids);
        self.record_errors.extend(other.record_errors);
    }
}

/// Summary of one export job
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub job_id: JobId,
    pub job_hrid: u64,
    pub status: JobStatus,

    /// Partitions per terminal status, in sequence order
    pub partitions: Vec<FileStatus>,

    pub exported: u64,
    pub failed: u64,
    pub duplicated_srs: u64,

    /// Identifiers no partition found a source record for
    pub not_found: Vec<String>,

    /// Uploaded artifact name, if anything was uploaded
    pub file_name: Option<String>,
    pub download_url: Option<String>,
    pub error_count: usize,
    pub duration: Duration,
}

impl ExportSummary {
    /// Check if the export was successful (no failures)
    pub fn is_successful(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.exported + self.failed;
        if total == 0 {
            return 100.0;
        }
        (self.exported as f64 / total as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            job_id = %self.job_id,
            job_hrid = self.job_hrid,
            status = ?self.status,
            partitions = self.partitions.len(),
            exported = self.exported,
            failed = self.failed,
            duplicated_srs = self.duplicated_srs,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Export completed"
        );

        if self.error_count > 0 {
            tracing::warn!(
                job_id = %self.job_id,
                error_count = self.error_count,
                "Export completed with errors"
            );
        }
    }
}
