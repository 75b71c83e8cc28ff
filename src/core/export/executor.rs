//! Partition executor
//!
//! Runs one partition file from `SCHEDULED` to a terminal status. Errors
//! escaping the strategy fail this partition only: they are logged and
//! recorded in the error log, never returned, so sibling partitions keep
//! running. Only status persistence errors reach the caller.

use super::failures::FailureAggregator;
use super::strategy::{export_partition, ExportContext, ExportStrategy};
use super::summary::ExportStatistics;
use super::writer::LocalStorageWriter;
use crate::core::state::{JobStatusManager, PartitionProgress};
use crate::domain::{ExportFile, FileStatus, JobStatus, Result};
use crate::{log_partition_complete, log_partition_start};
use std::sync::Arc;

/// Result of one executed partition
#[derive(Debug, Clone)]
pub struct PartitionOutcome {
    /// The file in its terminal status
    pub file: ExportFile,

    /// Statistics, absent when the partition failed as a whole
    pub stats: Option<ExportStatistics>,

    /// Job aggregate, set by the partition that finished last
    pub job_status: Option<JobStatus>,
}

/// Executes partitions of one job
#[derive(Clone)]
pub struct ExportExecutor {
    strategy: Arc<dyn ExportStrategy>,
    context: ExportContext,
    status: Arc<JobStatusManager>,
    failures: FailureAggregator,
    write_buffer_size: usize,
}

impl ExportExecutor {
    pub fn new(
        strategy: Arc<dyn ExportStrategy>,
        context: ExportContext,
        status: Arc<JobStatusManager>,
        failures: FailureAggregator,
        write_buffer_size: usize,
    ) -> Self {
        Self {
            strategy,
            context,
            status,
            failures,
            write_buffer_size,
        }
    }

    /// Export `file` and persist its terminal status
    ///
    /// # Errors
    ///
    /// Returns an error only if a status or error log write fails.
    pub async fn execute(&self, mut file: ExportFile) -> Result<PartitionOutcome> {
        self.status.start_partition(&mut file).await?;
        log_partition_start!(file.job_id, file.id);

        let (next, stats, progress) = match self.run(&file).await {
            Ok(stats) => {
                self.failures.collect(&file.job_id, &file.id, &stats).await?;
                let progress = PartitionProgress {
                    exported: stats.exported,
                    failed: stats.failed,
                    duplicated_srs: stats.duplicated_srs,
                };
                (stats.partition_status(), Some(stats), progress)
            }
            Err(e) => {
                tracing::error!(
                    job_id = %file.job_id,
                    file_id = %file.id,
                    path = %file.file_location.display(),
                    error = %e,
                    "Export partition failed"
                );
                self.failures
                    .record_partition_failure(&file.job_id, &file, &e)
                    .await?;
                let progress = PartitionProgress {
                    failed: file.scope.input_len().unwrap_or(0) as u64,
                    ..Default::default()
                };
                (FileStatus::Failed, None, progress)
            }
        };

        file.transition(next)?;
        let job_status = self.status.complete_partition(&file, progress).await?;
        log_partition_complete!(file.job_id, file.id, file.status, progress.exported, progress.failed);

        Ok(PartitionOutcome {
            file,
            stats,
            job_status,
        })
    }

    async fn run(&self, file: &ExportFile) -> Result<ExportStatistics> {
        let mut writer = LocalStorageWriter::open(&file.file_location, self.write_buffer_size)?;

        match export_partition(self.strategy.as_ref(), file, &self.context, &mut writer).await {
            Ok(stats) => {
                if stats.exported == 0 {
                    writer.write(&[])?;
                } else {
                    let bytes = writer.close()?;
                    tracing::debug!(file_id = %file.id, bytes, "Partition file closed");
                }
                Ok(stats)
            }
            Err(e) => {
                writer.discard();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::provider::InMemoryRecordProvider;
    use crate::adapters::repository::{
        ErrorLogRepository, ExportFileRepository, InMemoryRepository, JobRepository,
    };
    use crate::config::LinksConfig;
    use crate::core::export::strategy::InstanceStrategy;
    use crate::core::reference_data::ReferenceDataCache;
    use crate::core::transform::{compile_profile, TransformationEngine};
    use crate::domain::{ErrorCode, JobBuilder, MappingProfile, PartitionScope, RecordId};
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        executor: ExportExecutor,
        _dir: TempDir,
        files: Vec<ExportFile>,
    }

    async fn fixture(scopes: Vec<Vec<String>>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let mut job = JobBuilder::new(1, Uuid::nil()).build();
        job.mark_started();
        repo.create_job(&job).await.unwrap();

        let files: Vec<ExportFile> = scopes
            .into_iter()
            .enumerate()
            .map(|(i, ids)| {
                ExportFile::scheduled(
                    job.id,
                    i + 1,
                    dir.path().join(format!("part-{}.mrc", i + 1)),
                    PartitionScope::Ids { ids },
                )
            })
            .collect();
        repo.save_files(&files).await.unwrap();

        let provider = InMemoryRecordProvider::new()
            .with_instance(json!({"id": RecordId::from_u128(1).to_string(), "title": "Moby Dick"}))
            .unwrap();
        let engine = TransformationEngine::new(
            Arc::new(compile_profile(&MappingProfile::default_instance()).unwrap()),
            Arc::new(ReferenceDataCache::default()),
        );
        let context = ExportContext {
            job_id: job.id,
            provider: Arc::new(provider),
            engine: Arc::new(engine),
            batch_size: 50,
            links: LinksConfig::default(),
        };
        let executor = ExportExecutor::new(
            Arc::new(InstanceStrategy),
            context,
            Arc::new(JobStatusManager::new(repo.clone(), repo.clone())),
            FailureAggregator::new(repo.clone()),
            1024,
        );
        Fixture {
            repo,
            executor,
            _dir: dir,
            files,
        }
    }

    #[tokio::test]
    async fn test_clean_partition_completes() {
        let fx = fixture(vec![vec![RecordId::from_u128(1).to_string()]]).await;
        let outcome = fx.executor.execute(fx.files[0].clone()).await.unwrap();

        assert_eq!(outcome.file.status, FileStatus::Completed);
        assert_eq!(outcome.job_status, Some(JobStatus::Completed));
        assert!(std::fs::metadata(&outcome.file.file_location).unwrap().len() > 0);
        let stored = fx.repo.get_file(&outcome.file.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FileStatus::Completed);
    }

    #[tokio::test]
    async fn test_partition_without_output_removes_file() {
        let fx = fixture(vec![vec![RecordId::from_u128(9).to_string()]]).await;
        let outcome = fx.executor.execute(fx.files[0].clone()).await.unwrap();

        assert_eq!(outcome.file.status, FileStatus::Failed);
        assert!(!outcome.file.file_location.exists());
        let job_id = outcome.file.job_id;
        let entries = fx.repo.entries_for_job(&job_id).await.unwrap();
        assert_eq!(entries[0].code, ErrorCode::RecordNotFound);
    }

    #[tokio::test]
    async fn test_storage_failure_fails_only_that_partition() {
        let fx = fixture(vec![
            vec![RecordId::from_u128(1).to_string()],
            vec![RecordId::from_u128(1).to_string(), "x".to_string()],
        ])
        .await;
        // a directory where the file should go makes the writer fail to open
        std::fs::create_dir_all(&fx.files[1].file_location).unwrap();

        let first = fx.executor.execute(fx.files[0].clone()).await.unwrap();
        let second = fx.executor.execute(fx.files[1].clone()).await.unwrap();

        assert_eq!(first.file.status, FileStatus::Completed);
        assert_eq!(second.file.status, FileStatus::Failed);
        assert!(second.stats.is_none());
        assert_eq!(second.job_status, Some(JobStatus::CompletedWithErrors));

        let job = fx.repo.get_job(&first.file.job_id).await.unwrap().unwrap();
        assert_eq!(job.progress.exported, 1);
        assert_eq!(job.progress.failed, 2);

        let entries = fx.repo.entries_for_job(&job.id).await.unwrap();
        let failure = entries
            .iter()
            .find(|e| e.code == ErrorCode::PartitionFailed)
            .unwrap();
        assert_eq!(failure.file_id, Some(second.file.id));
    }

    #[tokio::test]
    async fn test_file_must_be_scheduled() {
        let fx = fixture(vec![vec![]]).await;
        let mut file = fx.files[0].clone();
        file.transition(FileStatus::Active).unwrap();
        assert!(fx.executor.execute(file).await.is_err());
    }
}
