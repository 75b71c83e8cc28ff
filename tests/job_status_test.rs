//! Integration tests for partition and job status tracking

use marcport::adapters::repository::{ExportFileRepository, InMemoryRepository, JobRepository};
use marcport::core::state::{aggregate_status, JobStatusManager, PartitionProgress};
use marcport::domain::{ExportFile, FileStatus, Job, JobBuilder, JobStatus, PartitionScope};
use std::path::PathBuf;
use std::sync::Arc;
use test_case::test_case;
use uuid::Uuid;

#[test_case(&[FileStatus::Completed, FileStatus::Completed] => Some(JobStatus::Completed); "all completed")]
#[test_case(&[FileStatus::Completed, FileStatus::CompletedWithErrors] => Some(JobStatus::CompletedWithErrors); "one with errors")]
#[test_case(&[FileStatus::Completed, FileStatus::Failed] => Some(JobStatus::CompletedWithErrors); "one failed")]
#[test_case(&[FileStatus::Failed, FileStatus::Failed] => Some(JobStatus::Fail); "all failed")]
#[test_case(&[FileStatus::Completed, FileStatus::Active] => None; "one still active")]
#[test_case(&[FileStatus::Scheduled] => None; "not started")]
#[test_case(&[] => None; "no partitions")]
fn test_job_status_reduction(statuses: &[FileStatus]) -> Option<JobStatus> {
    aggregate_status(statuses)
}

async fn scheduled_job(
    repo: &Arc<InMemoryRepository>,
    partitions: usize,
) -> (Job, Vec<ExportFile>) {
    let mut job = JobBuilder::new(1, Uuid::nil()).total(partitions as u64).build();
    job.mark_started();
    repo.create_job(&job).await.unwrap();

    let files: Vec<ExportFile> = (1..=partitions)
        .map(|seq| {
            ExportFile::scheduled(
                job.id,
                seq,
                PathBuf::from(format!("/tmp/marcport/{}/part-{seq}.mrc", job.id)),
                PartitionScope::Ids { ids: vec![] },
            )
        })
        .collect();
    repo.save_files(&files).await.unwrap();
    (job, files)
}

#[tokio::test]
async fn test_last_partition_sets_job_status_once() {
    let repo = Arc::new(InMemoryRepository::new());
    let manager = Arc::new(JobStatusManager::new(repo.clone(), repo.clone()));
    let (job, files) = scheduled_job(&repo, 32).await;

    let mut handles = Vec::new();
    for (i, mut file) in files.into_iter().enumerate() {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.start_partition(&mut file).await.unwrap();
            tokio::task::yield_now().await;
            let status = if i == 7 {
                FileStatus::Failed
            } else {
                FileStatus::Completed
            };
            file.transition(status).unwrap();
            manager
                .complete_partition(
                    &file,
                    PartitionProgress {
                        exported: 1,
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
        }));
    }

    let mut aggregates = Vec::new();
    for handle in handles {
        if let Some(status) = handle.await.unwrap() {
            aggregates.push(status);
        }
    }

    assert_eq!(aggregates, vec![JobStatus::CompletedWithErrors]);
    let stored = repo.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::CompletedWithErrors);
    assert_eq!(stored.progress.exported, 32);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_partition_cannot_complete_without_running() {
    let repo = Arc::new(InMemoryRepository::new());
    let manager = JobStatusManager::new(repo.clone(), repo.clone());
    let (_, files) = scheduled_job(&repo, 1).await;

    let result = manager
        .complete_partition(&files[0], PartitionProgress::default())
        .await;
    assert!(result.is_err());
}
