//! Export coordinator - main orchestrator for an export job
//!
//! Creates the job, compiles the mapping profile and loads reference data
//! once, splits the request into partitions, runs one executor per partition
//! on a bounded set of tokio tasks, then uploads the surviving files and
//! finalizes the error log.

use super::executor::{ExportExecutor, PartitionOutcome};
use super::failures::FailureAggregator;
use super::partition::{chunk_ids, dedupe_ids, prepare_files, split_id_space};
use super::strategy::{create_strategy, select_strategy, ExportContext, ExportScope, StrategyKind};
use super::summary::{ExportStatistics, ExportSummary};
use super::uploader::StorageUploader;
use crate::adapters::provider::{InMemoryRecordProvider, RecordProvider};
use crate::adapters::reference::{DirectoryReferenceSource, ReferenceDataSource};
use crate::adapters::repository::{
    ErrorLogRepository, ExportFileRepository, InMemoryRepository, JobRepository,
};
use crate::adapters::storage::{LocalObjectStorage, ObjectStorage};
use crate::config::{ExportConfig, LinksConfig, MarcportConfig};
use crate::core::reference_data::ReferenceDataCache;
use crate::core::state::JobStatusManager;
use crate::core::transform::linked_data::IDENTIFIER_TYPES_TABLE;
use crate::core::transform::{compile_profile, TransformationEngine};
use crate::domain::{
    ErrorCode, ExportError, ExportFile, ExportRequest, FileStatus, Job, JobBuilder, JobStatus,
    MappingProfile, PartitionScope, Result,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Collaborators the coordinator drives
#[derive(Clone)]
pub struct ExportServices {
    pub provider: Arc<dyn RecordProvider>,
    pub reference_source: Arc<dyn ReferenceDataSource>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jobs: Arc<dyn JobRepository>,
    pub files: Arc<dyn ExportFileRepository>,
    pub error_logs: Arc<dyn ErrorLogRepository>,
}

impl ExportServices {
    /// Local adapters built from configuration
    ///
    /// Records are read from `source.data_dir`, reference tables from
    /// `source.reference_data_dir`, and artifacts are stored under
    /// `storage.root`. Jobs live in memory for the lifetime of the process.
    pub fn from_config(config: &MarcportConfig) -> Result<Self> {
        let provider = InMemoryRecordProvider::from_dir(&config.source.data_dir)?;
        let repository = Arc::new(InMemoryRepository::new());
        Ok(Self {
            provider: Arc::new(provider),
            reference_source: Arc::new(DirectoryReferenceSource::new(
                &config.source.reference_data_dir,
            )),
            storage: Arc::new(LocalObjectStorage::from_config(&config.storage)),
            jobs: repository.clone(),
            files: repository.clone(),
            error_logs: repository,
        })
    }
}

/// Export coordinator
pub struct ExportCoordinator {
    export: ExportConfig,
    links: LinksConfig,
    services: ExportServices,
    status: Arc<JobStatusManager>,
    failures: FailureAggregator,
    uploader: StorageUploader,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(config: &MarcportConfig, services: ExportServices) -> Self {
        let status = Arc::new(JobStatusManager::new(
            services.jobs.clone(),
            services.files.clone(),
        ));
        let failures = FailureAggregator::new(services.error_logs.clone());
        let uploader = StorageUploader::new(
            services.storage.clone(),
            config.storage.scope.clone(),
            config.export.tmp_root.clone(),
            Duration::from_secs(config.storage.download_url_ttl_seconds),
        );
        Self {
            export: config.export.clone(),
            links: config.links.clone(),
            services,
            status,
            failures,
            uploader,
        }
    }

    pub fn status_manager(&self) -> Arc<JobStatusManager> {
        self.status.clone()
    }

    /// Run one export job to completion
    ///
    /// `profile` is the mapping profile resolved from the request's job
    /// profile. Without one, the reserved default profile for the request's
    /// record type is used.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Validation`] for a request with nothing to
    /// export or an unsafe file name, before any job is created. Structural failures
    /// ([`ExportError::EmptyExport`], [`ExportError::DefaultProfileMissing`])
    /// and repository errors fail the job and are returned. Partition
    /// failures are not errors; they show up in the summary status.
    pub async fn execute(
        &self,
        request: ExportRequest,
        profile: Option<MappingProfile>,
    ) -> Result<ExportSummary> {
        request.validate()?;
        self.sweep_expired_jobs().await;

        let started = Instant::now();
        let mut job = self.create_job(&request, profile.as_ref()).await?;
        tracing::info!(
            job_id = %job.id,
            job_hrid = job.hrid,
            record_type = %request.record_type,
            all = request.all,
            ids = request.ids.len(),
            "Starting export job"
        );

        match self.run(&mut job, &request, profile, started).await {
            Ok(summary) => {
                summary.log_summary();
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Export job failed");
                self.fail_job(&job, &e).await;
                Err(e)
            }
        }
    }

    async fn create_job(
        &self,
        request: &ExportRequest,
        profile: Option<&MappingProfile>,
    ) -> Result<Job> {
        let hrid = self.services.jobs.next_hrid().await?;
        let base_name = request
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| self.export.default_file_base_name.clone(), str::to_string);

        let mut builder = JobBuilder::new(hrid, profile.map_or_else(Uuid::nil, |p| p.id))
            .created_by(request.created_by.clone())
            .file_base_name(base_name)
            .total(request.ids.len() as u64);
        if let Some(job_profile_id) = request.job_profile_id {
            builder = builder.job_profile_id(job_profile_id);
        }

        let mut job = builder.build();
        job.mark_started();
        self.services.jobs.create_job(&job).await?;
        Ok(job)
    }

    async fn run(
        &self,
        job: &mut Job,
        request: &ExportRequest,
        profile: Option<MappingProfile>,
        started: Instant,
    ) -> Result<ExportSummary> {
        let profile = match profile {
            Some(profile) => profile,
            None => MappingProfile::default_for(request.record_type).ok_or_else(|| {
                ExportError::DefaultProfileMissing(request.record_type.to_string())
            })?,
        };
        job.mapping_profile_id = profile.id;

        let compiled = Arc::new(compile_profile(&profile)?);
        let (kind, scope) = select_strategy(
            &profile.record_types,
            profile.is_default,
            request.all,
            request.id_type,
        );

        let mut tables = compiled.referenced_tables();
        if kind == StrategyKind::LinkedData {
            tables.insert(IDENTIFIER_TYPES_TABLE.to_string());
        }
        let reference =
            ReferenceDataCache::load(self.services.reference_source.as_ref(), tables).await?;
        let engine = Arc::new(TransformationEngine::new(compiled, Arc::new(reference)));

        let scopes: Vec<PartitionScope> = match scope {
            ExportScope::All => split_id_space(self.export.partitions_per_job)
                .into_iter()
                .map(PartitionScope::Range)
                .collect(),
            ExportScope::ById => {
                let (unique, duplicates) = dedupe_ids(request.ids.clone());
                self.failures.record_duplicates(&job.id, &duplicates).await?;
                chunk_ids(&unique, self.export.records_per_file)
                    .into_iter()
                    .map(|ids| PartitionScope::Ids { ids })
                    .collect()
            }
        };

        let files = prepare_files(job, scopes, &self.export.tmp_root, kind.extension());
        self.services.files.save_files(&files).await?;
        self.services.jobs.update_job(job).await?;
        tracing::info!(
            job_id = %job.id,
            strategy = %kind,
            partitions = files.len(),
            "Partitions scheduled"
        );

        let executor = ExportExecutor::new(
            Arc::from(create_strategy(kind)),
            ExportContext {
                job_id: job.id,
                provider: self.services.provider.clone(),
                engine,
                batch_size: self.export.batch_size,
                links: self.links.clone(),
            },
            self.status.clone(),
            self.failures.clone(),
            self.export.write_buffer_size,
        );
        let totals = self
            .run_partitions(&executor, files)
            .await?
            .into_iter()
            .filter_map(|outcome| outcome.stats)
            .fold(ExportStatistics::default(), |mut totals, stats| {
                totals.merge(stats);
                totals
            });
        tracing::debug!(
            job_id = %job.id,
            exported = totals.exported,
            failed = totals.failed,
            not_found = totals.not_found.len(),
            "Partitions finished"
        );

        let files = self.services.files.files_for_job(&job.id).await?;
        let uploadable: Vec<_> = files
            .iter()
            .filter(|f| f.status != FileStatus::Failed)
            .cloned()
            .collect();
        let upload = self
            .uploader
            .upload(job, &uploadable, kind.extension())
            .await?;

        let mut stored = self
            .services
            .jobs
            .get_job(&job.id)
            .await?
            .ok_or_else(|| ExportError::NotFound(format!("Job {}", job.id)))?;
        stored.file_names = vec![upload.file_name.clone()];
        stored.download_url = Some(upload.download_url.clone());
        if request.all {
            stored.progress.total = stored.progress.exported + stored.progress.failed;
        }
        stored.touch();
        self.services.jobs.update_job(&stored).await?;
        *job = stored;

        let entries = self.failures.finalize(&job.id).await?;

        Ok(ExportSummary {
            job_id: job.id,
            job_hrid: job.hrid,
            status: job.status,
            partitions: files.iter().map(|f| f.status).collect(),
            exported: job.progress.exported,
            failed: job.progress.failed,
            duplicated_srs: job.progress.duplicated_srs,
            not_found: totals.not_found,
            file_name: Some(upload.file_name),
            download_url: Some(upload.download_url),
            error_count: entries.len(),
            duration: started.elapsed(),
        })
    }

    /// Run every partition, at most `max_parallel_partitions` at once
    async fn run_partitions(
        &self,
        executor: &ExportExecutor,
        files: Vec<ExportFile>,
    ) -> Result<Vec<PartitionOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.export.max_parallel_partitions.max(1)));
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ExportError::Other(format!("Partition pool closed: {e}")))?;
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                executor.execute(file).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Partition status could not be persisted");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Partition task panicked");
                    first_error.get_or_insert(ExportError::Other(format!(
                        "Partition task failed: {e}"
                    )));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    async fn fail_job(&self, job: &Job, error: &ExportError) {
        let logged = match error {
            ExportError::EmptyExport { .. } => Some((ErrorCode::EmptyExport, Vec::new())),
            ExportError::DefaultProfileMissing(record_type) => {
                Some((ErrorCode::DefaultProfileMissing, vec![record_type.clone()]))
            }
            _ => None,
        };
        if let Some((code, values)) = logged {
            if let Err(e) = self.failures.record_job_failure(&job.id, code, values).await {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to log job failure");
            }
        }

        if let Err(e) = self.status.set_job_status(&job.id, JobStatus::Fail).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to mark job as failed");
        }

        let staging = self.export.tmp_root.join(job.id.to_string());
        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %staging.display(), error = %e, "Failed to remove job staging directory");
            }
        }
    }

    async fn sweep_expired_jobs(&self) {
        let max_idle = Duration::from_secs(self.export.job_expiry_minutes * 60);
        match self.status.expire_stale_jobs(max_idle).await {
            Ok(expired) if !expired.is_empty() => {
                tracing::info!(count = expired.len(), "Expired stale export jobs");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Job expiry sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::reference::InMemoryReferenceSource;
    use crate::adapters::storage::InMemoryObjectStorage;
    use crate::config::parse_config;
    use crate::domain::{RecordId, RecordType};
    use serde_json::json;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> MarcportConfig {
        parse_config(&format!(
            r#"
[export]
tmp_root = "{}"
records_per_file = 2

[storage]
root = "{}"
scope = "diku"
base_url = "http://localhost/files"
signing_key = "test-key"
"#,
            tmp.path().join("staging").display(),
            tmp.path().join("objects").display()
        ))
        .unwrap()
    }

    fn services(
        provider: InMemoryRecordProvider,
    ) -> (ExportServices, Arc<InMemoryRepository>, Arc<InMemoryObjectStorage>) {
        let repo = Arc::new(InMemoryRepository::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let services = ExportServices {
            provider: Arc::new(provider),
            reference_source: Arc::new(InMemoryReferenceSource::new()),
            storage: storage.clone(),
            jobs: repo.clone(),
            files: repo.clone(),
            error_logs: repo.clone(),
        };
        (services, repo, storage)
    }

    fn instances(n: u128) -> InMemoryRecordProvider {
        (1..=n).fold(InMemoryRecordProvider::new(), |provider, i| {
            provider
                .with_instance(json!({
                    "id": RecordId::from_u128(i).to_string(),
                    "hrid": format!("in{i}"),
                    "title": format!("Title {i}")
                }))
                .unwrap()
        })
    }

    #[tokio::test]
    async fn test_single_partition_uploads_plain_file() {
        let tmp = TempDir::new().unwrap();
        let (services, repo, storage) = services(instances(2));
        let coordinator = ExportCoordinator::new(&config(&tmp), services);

        let ids = vec![
            RecordId::from_u128(1).to_string(),
            RecordId::from_u128(2).to_string(),
        ];
        let summary = coordinator
            .execute(ExportRequest::by_ids(RecordType::Instance, ids), None)
            .await
            .unwrap();

        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.exported, 2);
        assert_eq!(summary.file_name.as_deref(), Some("quick-export-1.mrc"));
        assert_eq!(storage.write_calls().len(), 1);

        let job = repo.get_job(&summary.job_id).await.unwrap().unwrap();
        assert_eq!(job.file_names, vec!["quick-export-1.mrc"]);
        assert!(job.download_url.is_some());
        assert!(!tmp.path().join("staging").join(job.id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_logged_once() {
        let tmp = TempDir::new().unwrap();
        let (services, repo, _) = services(instances(1));
        let coordinator = ExportCoordinator::new(&config(&tmp), services);

        let id = RecordId::from_u128(1).to_string();
        let simple = id.replace('-', "");
        let summary = coordinator
            .execute(
                ExportRequest::by_ids(RecordType::Instance, vec![id.clone(), id, simple]),
                None,
            )
            .await
            .unwrap();

        assert_eq!(summary.exported, 1);
        assert_eq!(summary.failed, 0);
        let entries = repo.entries_for_job(&summary.job_id).await.unwrap();
        let duplicates = entries
            .iter()
            .find(|e| e.code == ErrorCode::DuplicateIdentifiers)
            .unwrap();
        assert_eq!(duplicates.values, vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn test_nothing_found_fails_job() {
        let tmp = TempDir::new().unwrap();
        let (services, repo, storage) = services(InMemoryRecordProvider::new());
        let coordinator = ExportCoordinator::new(&config(&tmp), services);

        let result = coordinator
            .execute(
                ExportRequest::by_ids(RecordType::Instance, vec![RecordId::from_u128(5).to_string()]),
                None,
            )
            .await;

        assert!(matches!(result, Err(ExportError::EmptyExport { .. })));
        assert!(storage.write_calls().is_empty());
        let failed = repo.jobs_with_status(JobStatus::Fail).await.unwrap();
        assert_eq!(failed.len(), 1);
        let entries = repo.entries_for_job(&failed[0].id).await.unwrap();
        assert!(entries.iter().any(|e| e.code == ErrorCode::EmptyExport));
    }

    #[tokio::test]
    async fn test_missing_default_profile_fails_job() {
        let tmp = TempDir::new().unwrap();
        let (services, repo, _) = services(instances(1));
        let coordinator = ExportCoordinator::new(&config(&tmp), services);

        let result = coordinator
            .execute(
                ExportRequest::by_ids(RecordType::Item, vec![RecordId::from_u128(1).to_string()]),
                None,
            )
            .await;

        assert!(matches!(result, Err(ExportError::DefaultProfileMissing(_))));
        assert_eq!(repo.jobs_with_status(JobStatus::Fail).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_name_outside_staging_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (services, repo, storage) = services(instances(1));
        let coordinator = ExportCoordinator::new(&config(&tmp), services);

        let mut request =
            ExportRequest::by_ids(RecordType::Instance, vec![RecordId::from_u128(1).to_string()]);
        request.file_name = Some("../../escaped".to_string());
        let result = coordinator.execute(request, None).await;

        assert!(matches!(result, Err(ExportError::Validation(_))));
        assert!(storage.write_calls().is_empty());
        assert!(repo.jobs_with_status(JobStatus::Fail).await.unwrap().is_empty());
        assert!(repo.jobs_with_status(JobStatus::InProgress).await.unwrap().is_empty());
        assert!(!tmp.path().join("escaped-1-1.mrc").exists());
        assert!(!tmp.path().join("staging").exists());
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected_before_job_creation() {
        let tmp = TempDir::new().unwrap();
        let (services, repo, _) = services(instances(1));
        let coordinator = ExportCoordinator::new(&config(&tmp), services);

        let result = coordinator
            .execute(ExportRequest::by_ids(RecordType::Instance, vec![]), None)
            .await;
        assert!(matches!(result, Err(ExportError::Validation(_))));
        assert!(repo.jobs_with_status(JobStatus::InProgress).await.unwrap().is_empty());
        assert!(repo.jobs_with_status(JobStatus::Fail).await.unwrap().is_empty());
    }
}
