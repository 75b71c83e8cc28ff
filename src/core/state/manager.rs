//! Job status manager
//!
//! Partition executors of one job finish concurrently, and each one re-reads
//! every partition of the job to recompute the aggregate status. That
//! read-modify-write runs under a lock keyed by job id, so no executor can
//! overwrite the job with a stale snapshot.

use crate::adapters::repository::{ExportFileRepository, JobRepository};
use crate::domain::{ExportError, ExportFile, FileStatus, JobId, JobStatus, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Counters one partition contributes to its job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionProgress {
    pub exported: u64,
    pub failed: u64,
    pub duplicated_srs: u64,
}

/// Aggregate status of a job from its partition statuses
///
/// Returns `None` while any partition is still running, or when the job has
/// no partitions.
///
/// # Examples
///
/// ```
/// use marcport::core::state::aggregate_status;
/// use marcport::domain::{FileStatus, JobStatus};
///
/// let status = aggregate_status(&[FileStatus::Completed, FileStatus::Failed]);
/// assert_eq!(status, Some(JobStatus::CompletedWithErrors));
/// ```
pub fn aggregate_status(statuses: &[FileStatus]) -> Option<JobStatus> {
    if statuses.is_empty() || statuses.iter().any(|s| !s.is_terminal()) {
        return None;
    }
    if statuses.iter().all(|s| *s == FileStatus::Completed) {
        Some(JobStatus::Completed)
    } else if statuses.iter().all(|s| *s == FileStatus::Failed) {
        Some(JobStatus::Fail)
    } else {
        Some(JobStatus::CompletedWithErrors)
    }
}

/// Owns every status write for jobs and their partition files
pub struct JobStatusManager {
    jobs: Arc<dyn JobRepository>,
    files: Arc<dyn ExportFileRepository>,
    locks: Mutex<HashMap<JobId, Arc<Mutex<()>>>>,
}

impl JobStatusManager {
    pub fn new(jobs: Arc<dyn JobRepository>, files: Arc<dyn ExportFileRepository>) -> Self {
        Self {
            jobs,
            files,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn job_lock(&self, job_id: &JobId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(*job_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other caller holds or waits on `lock`
    ///
    /// Clones are only handed out under the map lock, so the count cannot
    /// grow while it is checked.
    async fn release_job_lock(&self, job_id: &JobId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(job_id);
        }
    }

    /// Move a file to `ACTIVE` and persist it
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Validation`] if the file is not `SCHEDULED`.
    pub async fn start_partition(&self, file: &mut ExportFile) -> Result<()> {
        file.transition(FileStatus::Active)?;
        self.files.update_file(file).await
    }

    /// Persist a partition's terminal status and recompute its job
    ///
    /// The file row is written, the job's progress counters absorb
    /// `progress`, and once every partition is terminal the job takes the
    /// aggregate status. Returns that aggregate, or `None` while siblings are
    /// still running.
    pub async fn complete_partition(
        &self,
        file: &ExportFile,
        progress: PartitionProgress,
    ) -> Result<Option<JobStatus>> {
        if !file.status.is_terminal() {
            return Err(ExportError::Validation(format!(
                "File {} is {}, expected a terminal status",
                file.id, file.status
            )));
        }

        let lock = self.job_lock(&file.job_id).await;
        let guard = lock.lock().await;
        let result = self.record_completion(file, progress).await;
        drop(guard);
        self.release_job_lock(&file.job_id, lock).await;
        result
    }

    async fn record_completion(
        &self,
        file: &ExportFile,
        progress: PartitionProgress,
    ) -> Result<Option<JobStatus>> {
        self.files.update_file(file).await?;

        let mut job = self
            .jobs
            .get_job(&file.job_id)
            .await?
            .ok_or_else(|| ExportError::NotFound(format!("Job {}", file.job_id)))?;
        job.progress.exported += progress.exported;
        job.progress.failed += progress.failed;
        job.progress.duplicated_srs += progress.duplicated_srs;

        let statuses: Vec<FileStatus> = self
            .files
            .files_for_job(&file.job_id)
            .await?
            .iter()
            .map(|f| f.status)
            .collect();
        let aggregate = aggregate_status(&statuses);

        match aggregate {
            Some(status) => {
                job.finish(status);
                tracing::info!(
                    job_id = %job.id,
                    status = %status,
                    exported = job.progress.exported,
                    failed = job.progress.failed,
                    "All partitions finished"
                );
            }
            None => job.touch(),
        }
        self.jobs.update_job(&job).await?;
        Ok(aggregate)
    }

    /// Force a job into a terminal status outside the partition flow
    pub async fn set_job_status(&self, job_id: &JobId, status: JobStatus) -> Result<()> {
        let lock = self.job_lock(job_id).await;
        let guard = lock.lock().await;
        let result = match self.jobs.get_job(job_id).await {
            Ok(Some(mut job)) => {
                job.finish(status);
                self.jobs.update_job(&job).await
            }
            Ok(None) => Err(ExportError::NotFound(format!("Job {job_id}"))),
            Err(e) => Err(e),
        };
        drop(guard);
        self.release_job_lock(job_id, lock).await;
        result
    }

    /// Fail `IN_PROGRESS` jobs that have not been updated within `max_idle`
    ///
    /// Returns the ids of the expired jobs. Running partitions are not
    /// interrupted.
    pub async fn expire_stale_jobs(&self, max_idle: Duration) -> Result<Vec<JobId>> {
        let max_idle = chrono::Duration::from_std(max_idle)
            .map_err(|e| ExportError::Validation(format!("Invalid expiry interval: {e}")))?;
        let cutoff = chrono::Utc::now() - max_idle;

        let mut expired = Vec::new();
        for job in self.jobs.jobs_with_status(JobStatus::InProgress).await? {
            if job.updated_at >= cutoff {
                continue;
            }
            let lock = self.job_lock(&job.id).await;
            let guard = lock.lock().await;
            let result = self.expire_if_idle(&job.id, cutoff).await;
            drop(guard);
            self.release_job_lock(&job.id, lock).await;
            if result? {
                expired.push(job.id);
            }
        }
        Ok(expired)
    }

    async fn expire_if_idle(
        &self,
        job_id: &JobId,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool> {
        // re-read under the lock, a partition may have just finished
        let Some(mut current) = self.jobs.get_job(job_id).await? else {
            return Ok(false);
        };
        if current.status != JobStatus::InProgress || current.updated_at >= cutoff {
            return Ok(false);
        }
        current.finish(JobStatus::Fail);
        self.jobs.update_job(&current).await?;
        tracing::warn!(job_id = %current.id, "Expired stale export job");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::repository::InMemoryRepository;
    use crate::domain::{JobBuilder, PartitionScope};
    use std::path::PathBuf;
    use test_case::test_case;
    use uuid::Uuid;

    use crate::domain::FileStatus::{
        Active, Completed, CompletedWithErrors as Cwe, Failed, Scheduled,
    };

    #[test_case(&[Completed] => Some(JobStatus::Completed); "single completed")]
    #[test_case(&[Failed] => Some(JobStatus::Fail); "single failed")]
    #[test_case(&[Cwe] => Some(JobStatus::CompletedWithErrors); "single with errors")]
    #[test_case(&[Completed, Completed, Completed] => Some(JobStatus::Completed); "all completed")]
    #[test_case(&[Failed, Failed] => Some(JobStatus::Fail); "all failed")]
    #[test_case(&[Completed, Failed] => Some(JobStatus::CompletedWithErrors); "mixed")]
    #[test_case(&[Completed, Cwe] => Some(JobStatus::CompletedWithErrors); "completed and errors")]
    #[test_case(&[Failed, Cwe] => Some(JobStatus::CompletedWithErrors); "failed and errors")]
    #[test_case(&[Completed, Active] => None; "one running")]
    #[test_case(&[Scheduled] => None; "not started")]
    #[test_case(&[] => None; "no partitions")]
    fn test_aggregate_status(statuses: &[FileStatus]) -> Option<JobStatus> {
        aggregate_status(statuses)
    }

    async fn job_with_files(
        repo: &Arc<InMemoryRepository>,
        n: usize,
    ) -> (JobId, Vec<ExportFile>) {
        let mut job = JobBuilder::new(1, Uuid::nil()).build();
        job.mark_started();
        repo.create_job(&job).await.unwrap();
        let files: Vec<ExportFile> = (1..=n)
            .map(|seq| {
                ExportFile::scheduled(
                    job.id,
                    seq,
                    PathBuf::from(format!("/tmp/{seq}.mrc")),
                    PartitionScope::Ids { ids: vec![] },
                )
            })
            .collect();
        repo.save_files(&files).await.unwrap();
        (job.id, files)
    }

    #[tokio::test]
    async fn test_job_finishes_with_last_partition() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = JobStatusManager::new(repo.clone(), repo.clone());
        let (job_id, mut files) = job_with_files(&repo, 2).await;

        for file in files.iter_mut() {
            manager.start_partition(file).await.unwrap();
        }

        files[0].transition(Completed).unwrap();
        let first = manager
            .complete_partition(&files[0], PartitionProgress { exported: 3, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(first, None);
        assert_eq!(repo.get_job(&job_id).await.unwrap().unwrap().status, JobStatus::InProgress);

        files[1].transition(Failed).unwrap();
        let last = manager
            .complete_partition(&files[1], PartitionProgress { failed: 2, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(last, Some(JobStatus::CompletedWithErrors));

        let job = repo.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::CompletedWithErrors);
        assert_eq!(job.progress.exported, 3);
        assert_eq!(job.progress.failed, 2);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_partitions_lose_no_updates() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = Arc::new(JobStatusManager::new(repo.clone(), repo.clone()));
        let (job_id, files) = job_with_files(&repo, 16).await;

        let mut handles = Vec::new();
        for mut file in files {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.start_partition(&mut file).await.unwrap();
                tokio::task::yield_now().await;
                file.transition(Completed).unwrap();
                manager
                    .complete_partition(&file, PartitionProgress { exported: 1, ..Default::default() })
                    .await
                    .unwrap()
            }));
        }
        let mut finals = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                finals += 1;
            }
        }

        let job = repo.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(finals, 1);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress.exported, 16);
    }

    #[tokio::test]
    async fn test_job_lock_survives_while_a_caller_waits() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = JobStatusManager::new(repo.clone(), repo.clone());
        let (job_id, mut files) = job_with_files(&repo, 1).await;
        manager.start_partition(&mut files[0]).await.unwrap();

        // a caller that fetched the lock but has not acquired it yet
        let waiting = manager.job_lock(&job_id).await;

        files[0].transition(Completed).unwrap();
        let status = manager
            .complete_partition(&files[0], PartitionProgress::default())
            .await
            .unwrap();
        assert_eq!(status, Some(JobStatus::Completed));

        let current = manager.job_lock(&job_id).await;
        assert!(Arc::ptr_eq(&waiting, &current));
        drop(current);

        manager.set_job_status(&job_id, JobStatus::Fail).await.unwrap();
        drop(waiting);
        manager.set_job_status(&job_id, JobStatus::Fail).await.unwrap();
        assert!(manager.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_terminal_completion_is_rejected() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = JobStatusManager::new(repo.clone(), repo.clone());
        let (_, files) = job_with_files(&repo, 1).await;
        let result = manager
            .complete_partition(&files[0], PartitionProgress::default())
            .await;
        assert!(matches!(result, Err(ExportError::Validation(_))));
    }

    #[tokio::test]
    async fn test_expire_stale_jobs() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = JobStatusManager::new(repo.clone(), repo.clone());

        let mut stale = JobBuilder::new(1, Uuid::nil()).build();
        stale.mark_started();
        stale.updated_at = chrono::Utc::now() - chrono::Duration::hours(2);
        repo.create_job(&stale).await.unwrap();

        let mut fresh = JobBuilder::new(2, Uuid::nil()).build();
        fresh.mark_started();
        repo.create_job(&fresh).await.unwrap();

        let expired = manager
            .expire_stale_jobs(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(expired, vec![stale.id]);
        assert_eq!(repo.get_job(&stale.id).await.unwrap().unwrap().status, JobStatus::Fail);
        assert_eq!(
            repo.get_job(&fresh.id).await.unwrap().unwrap().status,
            JobStatus::InProgress
        );
    }
}
