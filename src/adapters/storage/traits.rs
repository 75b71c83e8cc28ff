//! Object storage contract

use crate::domain::errors::ObjectStorageError;
use crate::domain::ids::JobId;
use crate::domain::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Destination of exported artifacts
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `local_file` under `path`, returning the stored size in bytes
    async fn write(&self, path: &str, local_file: &Path) -> Result<u64>;

    /// List object paths starting with `prefix`
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove objects; paths that do not exist are ignored
    async fn remove_objects(&self, paths: &[String]) -> Result<()>;

    /// Time-limited download link for `path`
    async fn presigned_download_url(&self, path: &str, ttl: Duration) -> Result<String>;
}

/// Object path for an artifact, `{scope}/{job_id}/{file_name}`
pub fn object_path(scope: &str, job_id: &JobId, file_name: &str) -> String {
    format!("{}/{job_id}/{file_name}", scope.trim_matches('/'))
}

/// Reject absolute paths and parent-directory segments
pub fn validate_object_path(path: &str) -> std::result::Result<(), ObjectStorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|segment| segment.is_empty() || segment == "..");
    if invalid {
        Err(ObjectStorageError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}
