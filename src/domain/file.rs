//! Export partition file model
//!
//! Each partition of a job is backed by exactly one physical output file. The
//! file status moves through `SCHEDULED -> ACTIVE -> terminal` and never back.

use crate::domain::errors::ExportError;
use crate::domain::ids::{FileId, JobId, RecordId};
use crate::domain::result::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Partition file status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    Scheduled,
    Active,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl FileStatus {
    /// Whether no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileStatus::Completed | FileStatus::CompletedWithErrors | FileStatus::Failed
        )
    }

    fn rank(&self) -> u8 {
        match self {
            FileStatus::Scheduled => 0,
            FileStatus::Active => 1,
            FileStatus::Completed | FileStatus::CompletedWithErrors | FileStatus::Failed => 2,
        }
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        next.rank() == self.rank() + 1
            || (*self == FileStatus::Scheduled && next.is_terminal())
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Scheduled => "SCHEDULED",
            FileStatus::Active => "ACTIVE",
            FileStatus::Completed => "COMPLETED",
            FileStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            FileStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Half-open identifier range `[from, to)`; an absent `to` means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub from: RecordId,
    pub to: Option<RecordId>,
}

impl IdRange {
    /// The whole identifier space
    pub fn full() -> Self {
        Self {
            from: RecordId::from_u128(0),
            to: None,
        }
    }

    /// Whether `id` falls inside the range
    pub fn contains(&self, id: &RecordId) -> bool {
        *id >= self.from && self.to.map_or(true, |to| *id < to)
    }
}

/// What a partition covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionScope {
    /// Contiguous identifier range (entire-collection exports)
    Range(IdRange),
    /// Explicit identifier list, kept as submitted so invalid ones can be reported
    Ids { ids: Vec<String> },
}

impl PartitionScope {
    /// Number of input identifiers, if known up front
    pub fn input_len(&self) -> Option<usize> {
        match self {
            PartitionScope::Range(_) => None,
            PartitionScope::Ids { ids } => Some(ids.len()),
        }
    }
}

/// One physical output file of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportFile {
    pub id: FileId,
    pub job_id: JobId,
    /// 1-based position within the job
    pub sequence: usize,
    pub file_location: PathBuf,
    pub scope: PartitionScope,
    pub status: FileStatus,
    pub updated_at: DateTime<Utc>,
}

impl ExportFile {
    /// Create a scheduled partition file
    pub fn scheduled(
        job_id: JobId,
        sequence: usize,
        file_location: PathBuf,
        scope: PartitionScope,
    ) -> Self {
        Self {
            id: FileId::random(),
            job_id,
            sequence,
            file_location,
            scope,
            status: FileStatus::Scheduled,
            updated_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting any non-monotonic step
    pub fn transition(&mut self, next: FileStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ExportError::Validation(format!(
                "Illegal status transition for file {}: {} -> {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
