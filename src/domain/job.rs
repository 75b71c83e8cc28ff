//! Export job model
//!
//! A [`Job`] is the aggregate root of one export run. Its status is derived from
//! the statuses of its partition files; see
//! [`JobStatusManager`](crate::core::state::JobStatusManager).

use crate::domain::ids::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted, not yet started
    Scheduled,
    /// At least one partition is being processed
    InProgress,
    /// Every partition completed without errors
    Completed,
    /// Mixed outcome across partitions
    CompletedWithErrors,
    /// Every partition failed, or a job-level structural failure occurred
    Fail,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Scheduled
    }
}

impl JobStatus {
    /// Whether the job can no longer change status through partition updates
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::CompletedWithErrors | JobStatus::Fail
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            JobStatus::Fail => "FAIL",
        };
        f.write_str(s)
    }
}

/// Progress counters accumulated across partitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Identifiers submitted for export
    pub total: u64,
    /// Records written to output
    pub exported: u64,
    /// Records that failed transformation or encoding
    pub failed: u64,
    /// Extra underlying MARC records dropped as duplicates
    pub duplicated_srs: u64,
}

/// One export run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier
    pub id: JobId,

    /// Human-readable sequence number
    pub hrid: u64,

    /// Lifecycle status
    pub status: JobStatus,

    /// Progress counters
    pub progress: JobProgress,

    /// Job profile used for the run
    pub job_profile_id: Uuid,

    /// Mapping profile resolved from the job profile
    pub mapping_profile_id: Uuid,

    /// User that initiated the export
    pub created_by: String,

    /// Base name of the produced artifact
    pub file_base_name: String,

    /// Names of the uploaded artifacts
    pub file_names: Vec<String>,

    /// Presigned link to the uploaded artifact
    pub download_url: Option<String>,

    /// When work on the job started
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Last modification time, used by the expiry sweep
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Mark the job as started
    pub fn mark_started(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::InProgress;
        self.started_at = Some(now);
        self.completed_at = None;
        self.updated_at = now;
    }

    /// Move the job to a terminal status
    pub fn finish(&mut self, status: JobStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Refresh the modification time
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Artifact name stem, `{base}-{hrid}`
    pub fn artifact_stem(&self) -> String {
        format!("{}-{}", self.file_base_name, self.hrid)
    }

    /// Duration of the run if it finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }
}

/// Builder for creating Job instances
pub struct JobBuilder {
    id: JobId,
    hrid: u64,
    job_profile_id: Uuid,
    mapping_profile_id: Uuid,
    created_by: String,
    file_base_name: String,
    total: u64,
}

impl JobBuilder {
    /// Create a new JobBuilder
    pub fn new(hrid: u64, mapping_profile_id: Uuid) -> Self {
        Self {
            id: JobId::random(),
            hrid,
            job_profile_id: Uuid::nil(),
            mapping_profile_id,
            created_by: "system".to_string(),
            file_base_name: "quick-export".to_string(),
            total: 0,
        }
    }

    /// Set the job identifier
    pub fn id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    /// Set the job profile
    pub fn job_profile_id(mut self, id: Uuid) -> Self {
        self.job_profile_id = id;
        self
    }

    /// Set the initiating user
    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = user.into();
        self
    }

    /// Set the artifact base name
    pub fn file_base_name(mut self, name: impl Into<String>) -> Self {
        self.file_base_name = name.into();
        self
    }

    /// Set the number of submitted identifiers
    pub fn total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    /// Build the Job instance
    pub fn build(self) -> Job {
        Job {
            id: self.id,
            hrid: self.hrid,
            status: JobStatus::Scheduled,
            progress: JobProgress {
                total: self.total,
                ..JobProgress::default()
            },
            job_profile_id: self.job_profile_id,
            mapping_profile_id: self.mapping_profile_id,
            created_by: self.created_by,
            file_base_name: self.file_base_name,
            file_names: Vec::new(),
            download_url: None,
            started_at: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder_defaults() {
        let job = JobBuilder::new(7, Uuid::nil()).build();
        assert_eq!(job.hrid, 7);
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.progress, JobProgress::default());
        assert_eq!(job.artifact_stem(), "quick-export-7");
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = JobBuilder::new(1, Uuid::nil())
            .file_base_name("catalog")
            .total(10)
            .build();

        job.mark_started();
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.duration().is_none());

        job.finish(JobStatus::CompletedWithErrors);
        assert!(job.status.is_terminal());
        assert!(job.duration().is_some());
        assert_eq!(job.progress.total, 10);
    }

    #[test]
    fn test_job_status_serialization() {
        let json = serde_json::to_string(&JobStatus::CompletedWithErrors).unwrap();
        assert_eq!(json, "\"COMPLETED_WITH_ERRORS\"");
        let status: JobStatus = serde_json::from_str("\"FAIL\"").unwrap();
        assert_eq!(status, JobStatus::Fail);
    }
}
