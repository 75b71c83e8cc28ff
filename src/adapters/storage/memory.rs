//! In-memory object storage for tests

use super::traits::{validate_object_path, ObjectStorage};
use crate::domain::errors::ObjectStorageError;
use crate::domain::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Object storage keeping object bytes in a map
#[derive(Debug, Default)]
pub struct InMemoryObjectStorage {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: Mutex<Vec<String>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bytes of `path`
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(path).cloned()
    }

    /// Every path passed to `write`, in call order
    pub fn write_calls(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    fn poisoned(path: &str) -> ObjectStorageError {
        ObjectStorageError::Write {
            path: path.to_string(),
            reason: "storage lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn write(&self, path: &str, local_file: &Path) -> Result<u64> {
        validate_object_path(path)?;
        let bytes = tokio::fs::read(local_file)
            .await
            .map_err(|e| ObjectStorageError::Write {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        let size = bytes.len() as u64;
        self.writes
            .lock()
            .map_err(|_| Self::poisoned(path))?
            .push(path.to_string());
        self.objects
            .lock()
            .map_err(|_| Self::poisoned(path))?
            .insert(path.to_string(), bytes);
        Ok(size)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.lock().map_err(|_| ObjectStorageError::List {
            prefix: prefix.to_string(),
            reason: "storage lock poisoned".to_string(),
        })?;
        Ok(objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn remove_objects(&self, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.lock().map_err(|_| ObjectStorageError::Remove {
            path: paths.join(","),
            reason: "storage lock poisoned".to_string(),
        })?;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn presigned_download_url(&self, path: &str, ttl: Duration) -> Result<String> {
        validate_object_path(path)?;
        Ok(format!("memory://{path}?ttl={}", ttl.as_secs()))
    }
}
