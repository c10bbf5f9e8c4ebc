//! File-system port.
//!
//! Downloads never write into their destination directly. Bytes go to a
//! staging path first and are relocated only after the whole payload has
//! arrived and been decrypted.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::transfer::{DownloadError, RecordId};

/// Errors from file-system operations.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// The path exists but is not a regular file.
    #[error("Not a file: {}", path.display())]
    NotAFile {
        /// The offending path.
        path: PathBuf,
    },

    /// An I/O operation failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl FileSystemError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Kind of the underlying failure, as a stable name.
    #[must_use]
    pub fn kind_name(&self) -> String {
        match self {
            Self::NotAFile { .. } => "NotAFile".to_string(),
            Self::Io { source, .. } => format!("{:?}", source.kind()),
        }
    }
}

impl From<FileSystemError> for DownloadError {
    fn from(err: FileSystemError) -> Self {
        Self::disk(err.kind_name(), err.to_string())
    }
}

/// Port for the file operations transfers need.
#[async_trait]
pub trait FileSystemPort: Send + Sync {
    /// Size in bytes of the file at `path`.
    ///
    /// Fails with `FileSystemError::NotAFile` when `path` is a directory or
    /// another non-file entry.
    async fn file_size(&self, path: &Path) -> Result<u64, FileSystemError>;

    /// True if `path` is an existing directory.
    async fn is_directory(&self, path: &Path) -> bool;

    /// A fresh staging path for a download of `id`.
    ///
    /// Concurrent downloads of the same identifier get distinct paths.
    fn staging_path(&self, id: RecordId) -> PathBuf;

    /// Append `bytes` to the staging file at `path`, creating it if needed.
    async fn append(&self, path: &Path, bytes: &[u8]) -> Result<(), FileSystemError>;

    /// Read the whole file at `path`.
    async fn read(&self, path: &Path) -> Result<Vec<u8>, FileSystemError>;

    /// Replace the contents of `path` with `bytes`.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), FileSystemError>;

    /// Move `from` to `to`, replacing any existing file at `to`.
    ///
    /// Readers of `to` observe either the old file or the complete new one.
    async fn relocate(&self, from: &Path, to: &Path) -> Result<(), FileSystemError>;

    /// Remove a staging artifact. A missing file is not an error.
    async fn remove(&self, path: &Path) -> Result<(), FileSystemError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_file_maps_to_disk_error() {
        let err: DownloadError = FileSystemError::NotAFile {
            path: PathBuf::from("/tmp"),
        }
        .into();

        match err {
            DownloadError::Disk { kind, message } => {
                assert_eq!(kind, "NotAFile");
                assert!(message.contains("/tmp"));
            }
            other => panic!("Expected Disk variant, got {other:?}"),
        }
    }

    #[test]
    fn test_io_error_keeps_kind_and_path() {
        let err = FileSystemError::io(
            "/staging/a.partial",
            io::Error::new(io::ErrorKind::StorageFull, "no space left"),
        );
        assert_eq!(err.kind_name(), "StorageFull");

        let mapped = DownloadError::from(err);
        assert_eq!(mapped.to_string(), "/staging/a.partial: no space left");
    }
}
