//! Batch transfers.
//!
//! Each helper starts one single-file operation per input, waits for all of
//! them concurrently, and folds every failure into one `Multiple` keyed by
//! record identifier. On success the results keep the input order.
//!
//! A synchronous start failure does not stop the other operations; it is
//! filed under its identifier like any other failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::task::{Id, JoinSet};

use cloudstore_core::crypto::SymmetricKey;
use cloudstore_core::ports::{FileDeleter, FileDownloader, FileUploader};
use cloudstore_core::transfer::{
    Aggregator, DownloadError, Downloadable, RecordId, TransferFailure, UploadError, Uploadable,
};

/// Operations spawned for one batch.
struct Batch<T, E> {
    tasks: JoinSet<Result<T, E>>,
    slots: HashMap<Id, (usize, RecordId)>,
    failures: Aggregator<E>,
    len: usize,
}

impl<T, E> Batch<T, E>
where
    T: Send + 'static,
    E: TransferFailure,
{
    fn new(len: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            slots: HashMap::with_capacity(len),
            failures: Aggregator::new(),
            len,
        }
    }

    fn spawn<Fut>(&mut self, index: usize, id: RecordId, operation: Fut)
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let handle = self.tasks.spawn(operation);
        self.slots.insert(handle.id(), (index, id));
    }

    fn fail(&mut self, id: RecordId, error: E) {
        self.failures.push(id, error);
    }

    async fn join(mut self) -> Result<Vec<T>, E> {
        let mut results: Vec<Option<T>> = (0..self.len).map(|_| None).collect();

        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((task, Ok(value))) => {
                    if let Some(&(index, _)) = self.slots.get(&task) {
                        results[index] = Some(value);
                    }
                }
                Ok((task, Err(error))) => {
                    if let Some(&(_, id)) = self.slots.get(&task) {
                        self.failures.push(id, error);
                    }
                }
                Err(join_error) => {
                    if let Some(&(_, id)) = self.slots.get(&join_error.id()) {
                        tracing::warn!(
                            id = %id,
                            error = %join_error,
                            "Batch task did not complete"
                        );
                        self.failures.push(id, E::unknown());
                    }
                }
            }
        }

        if let Some(error) = self.failures.finish() {
            return Err(error);
        }
        Ok(results.into_iter().flatten().collect())
    }
}

/// Download every file into `output_dir`, named by `Downloadable::file_name`.
///
/// # Errors
///
/// `DownloadError::Multiple` holding one entry per failed file.
pub async fn download_all<F, D>(
    downloader: &D,
    files: &[F],
    output_dir: &Path,
    decryption_key: Option<&SymmetricKey>,
) -> Result<Vec<PathBuf>, DownloadError>
where
    F: Downloadable,
    D: FileDownloader<F>,
{
    let mut batch = Batch::new(files.len());

    for (index, file) in files.iter().enumerate() {
        let id = file.record_identifier();
        let output = output_dir.join(file.file_name());
        match downloader.download_file(file, &output, decryption_key) {
            Ok(operation) => batch.spawn(index, id, operation.finish()),
            Err(error) => batch.fail(id, error),
        }
    }

    tracing::debug!(count = files.len(), dir = %output_dir.display(), "Waiting for batch download");
    batch.join().await
}

/// Upload every file, returning the uploaded values in input order.
///
/// # Errors
///
/// `UploadError::Multiple` holding one entry per failed file.
pub async fn upload_all<U, P>(
    uploader: &P,
    files: Vec<U>,
    encryption_key: Option<&SymmetricKey>,
) -> Result<Vec<U>, UploadError>
where
    U: Uploadable,
    P: FileUploader<U>,
{
    let mut batch = Batch::new(files.len());

    for (index, file) in files.into_iter().enumerate() {
        let id = file.id();
        match uploader.upload_file(file, encryption_key) {
            Ok(operation) => batch.spawn(index, id, operation.finish()),
            Err(error) => batch.fail(id, error),
        }
    }

    batch.join().await
}

/// Delete the remote object behind every file.
///
/// # Errors
///
/// `DownloadError::Multiple` holding one entry per failed file.
pub async fn delete_all<F, D>(downloader: &D, files: &[F]) -> Result<(), DownloadError>
where
    F: Downloadable,
    D: FileDownloader<F>,
    D::Deleter: 'static,
{
    let mut batch = Batch::new(files.len());

    for (index, file) in files.iter().enumerate() {
        let id = file.record_identifier();
        match downloader.delete_file(file) {
            Ok(deleter) => batch.spawn(index, id, deleter.finish()),
            Err(error) => batch.fail(id, error),
        }
    }

    batch.join().await.map(drop)
}
