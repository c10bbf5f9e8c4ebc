//! Local file-system adapter.
//!
//! Implements `FileSystemPort` on `tokio::fs`. Staging files live in one
//! directory and are named `<record id>-<random>.partial`, so concurrent
//! downloads of the same file never share a staging path.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use cloudstore_core::ports::{FileSystemError, FileSystemPort};
use cloudstore_core::transfer::RecordId;

/// Extension of staging files.
pub const STAGING_EXTENSION: &str = "partial";

/// `FileSystemPort` backed by the local disk.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    staging_directory: PathBuf,
}

impl LocalFileSystem {
    /// Create an adapter staging downloads in `staging_directory`.
    ///
    /// The directory is created lazily on first write.
    pub fn new(staging_directory: impl Into<PathBuf>) -> Self {
        Self {
            staging_directory: staging_directory.into(),
        }
    }

    /// The staging directory.
    pub fn staging_directory(&self) -> &Path {
        &self.staging_directory
    }

    /// Blocking variant of `file_size` for callers outside an async context.
    pub fn file_size_blocking(path: &Path) -> Result<u64, FileSystemError> {
        let metadata = std::fs::metadata(path).map_err(|e| FileSystemError::io(path, e))?;
        if !metadata.is_file() {
            return Err(FileSystemError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        Ok(metadata.len())
    }
}

async fn ensure_parent(path: &Path) -> Result<(), FileSystemError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FileSystemError::io(parent, e))?;
    }
    Ok(())
}

/// Copy into a sibling of `to`, then rename over it, so `to` is never partial.
async fn copy_then_rename(from: &Path, to: &Path) -> Result<(), FileSystemError> {
    let file_name = to
        .file_name()
        .map_or_else(|| "relocated".into(), |n| n.to_string_lossy().into_owned());
    let sibling = to.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    if let Err(e) = tokio::fs::copy(from, &sibling).await {
        let _ = tokio::fs::remove_file(&sibling).await;
        return Err(FileSystemError::io(from, e));
    }
    if let Err(e) = tokio::fs::rename(&sibling, to).await {
        let _ = tokio::fs::remove_file(&sibling).await;
        return Err(FileSystemError::io(to, e));
    }
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| FileSystemError::io(from, e))
}

#[async_trait]
impl FileSystemPort for LocalFileSystem {
    async fn file_size(&self, path: &Path) -> Result<u64, FileSystemError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| FileSystemError::io(path, e))?;
        if !metadata.is_file() {
            return Err(FileSystemError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        Ok(metadata.len())
    }

    async fn is_directory(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .is_ok_and(|metadata| metadata.is_dir())
    }

    fn staging_path(&self, id: RecordId) -> PathBuf {
        self.staging_directory.join(format!(
            "{id}-{}.{STAGING_EXTENSION}",
            Uuid::new_v4().simple()
        ))
    }

    async fn append(&self, path: &Path, bytes: &[u8]) -> Result<(), FileSystemError> {
        ensure_parent(path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| FileSystemError::io(path, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| FileSystemError::io(path, e))?;
        file.flush().await.map_err(|e| FileSystemError::io(path, e))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, FileSystemError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| FileSystemError::io(path, e))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), FileSystemError> {
        ensure_parent(path).await?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| FileSystemError::io(path, e))
    }

    async fn relocate(&self, from: &Path, to: &Path) -> Result<(), FileSystemError> {
        ensure_parent(to).await?;
        match tokio::fs::rename(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "Rename crosses devices, copying instead"
                );
                copy_then_rename(from, to).await
            }
            Err(e) => Err(FileSystemError::io(to, e)),
        }
    }

    async fn remove(&self, path: &Path) -> Result<(), FileSystemError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileSystemError::io(path, e)),
        }
    }
}
