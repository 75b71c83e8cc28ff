//! Artifact upload
//!
//! One non-empty partition file is uploaded as is. Several are bundled into
//! a zip archive first, each source file removed as soon as it is archived.
//! Objects left under the job's prefix by an earlier attempt are removed
//! before the write, and a failed write or link leaves no object behind.
//! The job's staging directory is removed afterwards whatever the outcome.

use crate::adapters::storage::{object_path, ObjectStorage};
use crate::domain::{ExportError, ExportFile, Job, JobId, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// What was uploaded for a job
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    /// Object storage path of the artifact
    pub object_path: String,

    /// Artifact file name
    pub file_name: String,

    /// Archive entry names, empty for a direct upload
    pub entries: Vec<String>,

    /// Stored size in bytes
    pub size: u64,

    pub download_url: String,
}

/// Uploads a job's partition files to object storage
#[derive(Clone)]
pub struct StorageUploader {
    storage: Arc<dyn ObjectStorage>,
    scope: String,
    tmp_root: PathBuf,
    url_ttl: Duration,
}

impl StorageUploader {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        scope: impl Into<String>,
        tmp_root: impl Into<PathBuf>,
        url_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            scope: scope.into(),
            tmp_root: tmp_root.into(),
            url_ttl,
        }
    }

    /// Upload the non-empty files among `files`
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::EmptyExport`] without uploading anything when
    /// every file is empty or missing.
    pub async fn upload(
        &self,
        job: &Job,
        files: &[ExportFile],
        extension: &str,
    ) -> Result<UploadOutcome> {
        let result = self.upload_files(job, files, extension).await;
        self.remove_job_directory(&job.id).await;
        result
    }

    async fn upload_files(
        &self,
        job: &Job,
        files: &[ExportFile],
        extension: &str,
    ) -> Result<UploadOutcome> {
        let mut sources = Vec::new();
        for file in files {
            if is_non_empty(&file.file_location).await {
                sources.push(file.file_location.clone());
            }
        }

        let stem = job.artifact_stem();
        let (local, file_name, entries) = match sources.len() {
            0 => {
                return Err(ExportError::EmptyExport {
                    job_id: job.id.to_string(),
                })
            }
            1 => (sources.remove(0), format!("{stem}.{extension}"), Vec::new()),
            _ => {
                let file_name = format!("{stem}.zip");
                let archive = self.tmp_root.join(job.id.to_string()).join(&file_name);
                let target = archive.clone();
                let entries = tokio::task::spawn_blocking(move || bundle(&target, &sources))
                    .await
                    .map_err(|e| ExportError::Other(format!("Archive task failed: {e}")))??;
                (archive, file_name, entries)
            }
        };

        let path = object_path(&self.scope, &job.id, &file_name);
        self.remove_stale_objects(&job.id).await?;
        let (size, download_url) = match self.store(&path, &local).await {
            Ok(stored) => stored,
            Err(e) => {
                if let Err(cleanup) = self.storage.remove_objects(&[path.clone()]).await {
                    tracing::warn!(
                        object_path = %path,
                        error = %cleanup,
                        "Failed to remove partially uploaded artifact"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            job_id = %job.id,
            object_path = %path,
            size,
            entries = entries.len(),
            "Uploaded export artifact"
        );

        Ok(UploadOutcome {
            object_path: path,
            file_name,
            entries,
            size,
            download_url,
        })
    }

    async fn store(&self, path: &str, local: &Path) -> Result<(u64, String)> {
        let size = self.storage.write(path, local).await?;
        let download_url = self
            .storage
            .presigned_download_url(path, self.url_ttl)
            .await?;
        Ok((size, download_url))
    }

    async fn remove_stale_objects(&self, job_id: &JobId) -> Result<()> {
        let prefix = format!("{}/{job_id}/", self.scope.trim_matches('/'));
        let stale = self.storage.list_objects(&prefix).await?;
        if !stale.is_empty() {
            tracing::debug!(prefix = %prefix, count = stale.len(), "Removing stale artifacts");
            self.storage.remove_objects(&stale).await?;
        }
        Ok(())
    }

    async fn remove_job_directory(&self, job_id: &JobId) {
        let dir = self.tmp_root.join(job_id.to_string());
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!(path = %dir.display(), "Removed job staging directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to remove job staging directory"
            ),
        }
    }
}

async fn is_non_empty(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Write `sources` into a zip archive at `archive`, deleting each after it is added
fn bundle(archive: &Path, sources: &[PathBuf]) -> Result<Vec<String>> {
    let mut zip = ZipWriter::new(std::fs::File::create(archive)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = Vec::with_capacity(sources.len());
    for source in sources {
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ExportError::Io(format!("No file name in {}", source.display())))?;
        zip.start_file(name.as_str(), options)?;
        let mut input = std::fs::File::open(source)?;
        std::io::copy(&mut input, &mut zip)?;
        drop(input);
        std::fs::remove_file(source)?;
        entries.push(name);
    }
    zip.finish()?;
    Ok(entries)
}
