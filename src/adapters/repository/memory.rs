//! In-memory persistence

use super::traits::{ErrorLogRepository, ExportFileRepository, JobRepository};
use crate::domain::error_log::{ErrorCode, ErrorLogEntry};
use crate::domain::file::ExportFile;
use crate::domain::ids::{FileId, JobId};
use crate::domain::job::{Job, JobStatus};
use crate::domain::{ExportError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Repository keeping jobs, files and error logs in memory
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    sequence: AtomicU64,
    jobs: Mutex<HashMap<JobId, Job>>,
    files: Mutex<HashMap<FileId, ExportFile>>,
    error_logs: Mutex<Vec<ErrorLogEntry>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ExportError::Repository("repository lock poisoned".to_string()))
}

#[async_trait]
impl JobRepository for InMemoryRepository {
    async fn next_hrid(&self) -> Result<u64> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        let mut jobs = lock(&self.jobs)?;
        if jobs.contains_key(&job.id) {
            return Err(ExportError::Repository(format!("Job {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<Job>> {
        Ok(lock(&self.jobs)?.get(job_id).cloned())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        match lock(&self.jobs)?.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(ExportError::NotFound(format!("Job {}", job.id))),
        }
    }

    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        Ok(lock(&self.jobs)?
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExportFileRepository for InMemoryRepository {
    async fn save_files(&self, files: &[ExportFile]) -> Result<()> {
        let mut stored = lock(&self.files)?;
        for file in files {
            stored.insert(file.id, file.clone());
        }
        Ok(())
    }

    async fn get_file(&self, file_id: &FileId) -> Result<Option<ExportFile>> {
        Ok(lock(&self.files)?.get(file_id).cloned())
    }

    async fn update_file(&self, file: &ExportFile) -> Result<()> {
        match lock(&self.files)?.get_mut(&file.id) {
            Some(stored) => {
                *stored = file.clone();
                Ok(())
            }
            None => Err(ExportError::NotFound(format!("Export file {}", file.id))),
        }
    }

    async fn files_for_job(&self, job_id: &JobId) -> Result<Vec<ExportFile>> {
        let mut files: Vec<ExportFile> = lock(&self.files)?
            .values()
            .filter(|file| file.job_id == *job_id)
            .cloned()
            .collect();
        files.sort_by_key(|file| file.sequence);
        Ok(files)
    }
}

#[async_trait]
impl ErrorLogRepository for InMemoryRepository {
    async fn save_entry(&self, entry: ErrorLogEntry) -> Result<()> {
        lock(&self.error_logs)?.push(entry);
        Ok(())
    }

    async fn merge_values(&self, job_id: &JobId, code: ErrorCode, values: &[String]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut logs = lock(&self.error_logs)?;
        match logs
            .iter_mut()
            .find(|entry| entry.job_id == *job_id && entry.code == code)
        {
            Some(entry) => {
                entry.merge_values(values);
            }
            None => {
                let mut entry = ErrorLogEntry::new(*job_id, code, Vec::new());
                entry.merge_values(values);
                logs.push(entry);
            }
        }
        Ok(())
    }

    async fn entries_for_job(&self, job_id: &JobId) -> Result<Vec<ErrorLogEntry>> {
        Ok(lock(&self.error_logs)?
            .iter()
            .filter(|entry| entry.job_id == *job_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobBuilder;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_hrid_is_increasing() {
        let repo = InMemoryRepository::new();
        let first = repo.next_hrid().await.unwrap();
        let second = repo.next_hrid().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_update_missing_job() {
        let repo = InMemoryRepository::new();
        let job = JobBuilder::new(1, Uuid::nil()).build();
        assert!(matches!(
            repo.update_job(&job).await,
            Err(ExportError::NotFound(_))
        ));
        repo.create_job(&job).await.unwrap();
        repo.update_job(&job).await.unwrap();
        assert!(repo.create_job(&job).await.is_err());
    }

    #[tokio::test]
    async fn test_merge_values_upserts() {
        let repo = InMemoryRepository::new();
        let job_id = JobId::random();
        let values = vec!["a".to_string(), "b".to_string()];

        repo.merge_values(&job_id, ErrorCode::RecordNotFound, &values)
            .await
            .unwrap();
        repo.merge_values(&job_id, ErrorCode::RecordNotFound, &values)
            .await
            .unwrap();
        repo.merge_values(&job_id, ErrorCode::RecordNotFound, &["c".to_string()])
            .await
            .unwrap();

        let entries = repo.entries_for_job(&job_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].values, vec!["a", "b", "c"]);
        assert_eq!(entries[0].message, "Record not found: a, b, c");
    }

    #[tokio::test]
    async fn test_concurrent_merges_lose_nothing() {
        let repo = std::sync::Arc::new(InMemoryRepository::new());
        let job_id = JobId::random();
        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.merge_values(&job_id, ErrorCode::InvalidUuidFormat, &[format!("id-{i}")])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let entries = repo.entries_for_job(&job_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].values.len(), 16);
    }
}
