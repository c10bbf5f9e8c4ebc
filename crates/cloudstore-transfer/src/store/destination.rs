//! Destination planning for downloads.
//!
//! A download's output is either an existing directory, in which case the
//! file is named after its record identifier and extension, or the final
//! file path itself.

use std::path::{Path, PathBuf};

use cloudstore_core::ports::FileSystemPort;

/// A planned download destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDestination {
    /// Where the finished file is moved.
    pub final_path: PathBuf,
    /// Where bytes are written while the download runs.
    pub staging_path: PathBuf,
}

impl DownloadDestination {
    /// Plan a destination.
    ///
    /// # Arguments
    ///
    /// * `output` - Directory or file path requested by the caller
    /// * `output_is_directory` - Whether `output` is an existing directory
    /// * `file_name` - Name to use inside a directory output
    /// * `staging_path` - Staging file for this download
    pub fn plan(
        output: &Path,
        output_is_directory: bool,
        file_name: &str,
        staging_path: PathBuf,
    ) -> Self {
        let final_path = if output_is_directory {
            output.join(file_name)
        } else {
            output.to_path_buf()
        };

        Self {
            final_path,
            staging_path,
        }
    }

    /// Plan a destination, asking the file system whether `output` is a directory.
    pub async fn resolve<S: FileSystemPort + ?Sized>(
        fs: &S,
        output: &Path,
        file_name: &str,
        staging_path: PathBuf,
    ) -> Self {
        let is_directory = fs.is_directory(output).await;
        Self::plan(output, is_directory, file_name, staging_path)
    }
}
