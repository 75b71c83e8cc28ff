//! Filesystem-backed object storage
//!
//! Objects live under a root directory. Download links are signed with
//! SHA-256 over the signing key, the object path and the expiry time.

use super::traits::{validate_object_path, ObjectStorage};
use crate::config::{SecretString, StorageConfig};
use crate::domain::errors::ObjectStorageError;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Object storage rooted in a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    base_url: String,
    signing_key: SecretString,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>, signing_key: SecretString) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
            signing_key,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.root, &config.base_url, config.signing_key.clone())
    }

    fn resolve(&self, path: &str) -> std::result::Result<PathBuf, ObjectStorageError> {
        validate_object_path(path)?;
        Ok(self.root.join(path))
    }

    /// Signature for `path` expiring at `expires` (unix seconds)
    fn sign(&self, path: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_key.expose_secret().as_bytes());
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn write(&self, path: &str, local_file: &Path) -> Result<u64> {
        let target = self.resolve(path)?;
        let to_err = |e: std::io::Error| ObjectStorageError::Write {
            path: path.to_string(),
            reason: e.to_string(),
        };
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(to_err)?;
        }
        let size = tokio::fs::copy(local_file, &target).await.map_err(to_err)?;
        tracing::debug!(path = %path, size, "Object written");
        Ok(size)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let to_err = |e: std::io::Error| ObjectStorageError::List {
            prefix: prefix.to_string(),
            reason: e.to_string(),
        };
        let mut objects = Vec::new();
        if !tokio::fs::try_exists(&self.root).await.map_err(to_err)? {
            return Ok(objects);
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(to_err)?;
            while let Some(entry) = entries.next_entry().await.map_err(to_err)? {
                let path = entry.path();
                if entry.file_type().await.map_err(to_err)?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    objects.push(key);
                }
            }
        }
        objects.sort();
        Ok(objects)
    }

    async fn remove_objects(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let target = self.resolve(path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ObjectStorageError::Remove {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                    .into())
                }
            }
        }
        Ok(())
    }

    async fn presigned_download_url(&self, path: &str, ttl: Duration) -> Result<String> {
        validate_object_path(path)?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        Ok(format!(
            "{}/{path}?expires={expires}&signature={}",
            self.base_url.trim_end_matches('/'),
            self.sign(path, expires)
        ))
    }
}
