//! Buffered local staging writer
//!
//! One writer owns one partition file. Writing an empty slice is the
//! end-of-stream signal for a partition that produced nothing and removes the
//! file. Every failure removes the file as well, so a partial artifact is
//! never left behind.

use crate::domain::StorageWriterError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only buffered sink over one local file
#[derive(Debug)]
pub struct LocalStorageWriter<W: Write = File> {
    path: PathBuf,
    inner: Option<BufWriter<W>>,
    bytes_written: u64,
    closed: bool,
}

impl LocalStorageWriter<File> {
    /// Create `path` (and its parent directories) for writing
    ///
    /// # Errors
    ///
    /// Returns [`StorageWriterError::Create`] when the file cannot be created.
    pub fn open(path: impl Into<PathBuf>, buffer_size: usize) -> Result<Self, StorageWriterError> {
        let path = path.into();
        let create_error = |reason: String| StorageWriterError::Create {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| create_error(e.to_string()))?;
        }
        let file = File::create(&path).map_err(|e| create_error(e.to_string()))?;

        tracing::debug!(path = %path.display(), buffer_size, "Staging file opened");
        Ok(Self::with_sink(path, file, buffer_size))
    }
}

impl<W: Write> LocalStorageWriter<W> {
    /// Wrap an already open sink whose backing file lives at `path`
    pub fn with_sink(path: impl Into<PathBuf>, sink: W, buffer_size: usize) -> Self {
        Self {
            path: path.into(),
            inner: Some(BufWriter::with_capacity(buffer_size.max(1), sink)),
            bytes_written: 0,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Append `data`; an empty slice ends the stream and removes the file
    ///
    /// # Errors
    ///
    /// Returns [`StorageWriterError::Write`] on I/O failure, after removing
    /// the file. Returns [`StorageWriterError::Discarded`] once the writer no
    /// longer holds a file; a closed file is left in place.
    pub fn write(&mut self, data: &[u8]) -> Result<(), StorageWriterError> {
        if data.is_empty() {
            tracing::debug!(path = %self.path.display(), "Empty content, removing staging file");
            self.discard();
            return Ok(());
        }

        let Some(inner) = self.inner.as_mut() else {
            return Err(StorageWriterError::Discarded(self.path.display().to_string()));
        };

        if let Err(e) = inner.write_all(data) {
            self.discard();
            return Err(StorageWriterError::Write {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            });
        }
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flush and release the file, returning the number of bytes written
    ///
    /// Calling `close` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageWriterError::Close`] when the flush fails; the file
    /// has been removed.
    pub fn close(&mut self) -> Result<u64, StorageWriterError> {
        let Some(mut inner) = self.inner.take() else {
            return Ok(self.bytes_written);
        };
        self.closed = true;

        if let Err(e) = inner.flush() {
            let _ = inner.into_parts();
            self.remove_file();
            return Err(StorageWriterError::Close {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            });
        }
        drop(inner);
        Ok(self.bytes_written)
    }

    /// Drop the handle without flushing and remove the file
    pub fn discard(&mut self) {
        if let Some(inner) = self.inner.take() {
            let _ = inner.into_parts();
        }
        self.closed = true;
        self.remove_file();
    }

    fn remove_file(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Staging file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staging file"
            ),
        }
    }
}

impl<W: Write> Drop for LocalStorageWriter<W> {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(path = %self.path.display(), "Staging writer dropped while open, discarding");
            self.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::TempDir;

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn test_write_and_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job/a-1-1.mrc");
        let mut writer = LocalStorageWriter::open(&path, 16).unwrap();
        writer.write(b"record one").unwrap();
        writer.write(b"record two").unwrap();

        assert_eq!(writer.close().unwrap(), 20);
        assert_eq!(writer.close().unwrap(), 20);
        assert_eq!(std::fs::read(&path).unwrap(), b"record onerecord two");
    }

    #[test]
    fn test_empty_write_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mrc");
        let mut writer = LocalStorageWriter::open(&path, 16).unwrap();
        assert!(path.exists());

        writer.write(b"").unwrap();
        assert!(!path.exists());
        assert!(matches!(
            writer.write(b"late"),
            Err(StorageWriterError::Discarded(_))
        ));
        assert_eq!(writer.close().unwrap(), 0);
    }

    #[test]
    fn test_write_after_close_keeps_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mrc");
        let mut writer = LocalStorageWriter::open(&path, 16).unwrap();
        writer.write(b"record").unwrap();
        writer.close().unwrap();

        assert!(matches!(
            writer.write(b"late"),
            Err(StorageWriterError::Discarded(_))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"record");
    }

    #[test]
    fn test_failed_write_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mrc");
        std::fs::write(&path, b"partial").unwrap();

        // capacity 1 forces the write straight through to the sink
        let mut writer = LocalStorageWriter::with_sink(&path, BrokenSink, 1);
        let err = writer.write(b"record").unwrap_err();
        assert!(matches!(err, StorageWriterError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_close_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mrc");
        std::fs::write(&path, b"partial").unwrap();

        let mut writer = LocalStorageWriter::with_sink(&path, BrokenSink, 1024);
        writer.write(b"buffered").unwrap();
        let err = writer.close().unwrap_err();
        assert!(matches!(err, StorageWriterError::Close { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_while_open_discards() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mrc");
        {
            let mut writer = LocalStorageWriter::open(&path, 16).unwrap();
            writer.write(b"data").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_open_fails_on_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        assert!(matches!(
            LocalStorageWriter::open(&path, 16),
            Err(StorageWriterError::Create { .. })
        ));
    }
}
