//! Download worker.
//!
//! Pipeline:
//! 1. Fetch the object and append its chunks to a staging file
//! 2. Decrypt the staged bytes in place when a key was supplied
//! 3. Relocate the staging file into the destination
//!
//! Steps 1 and 2 race the cancellation token. Any failure or cancellation
//! removes the staging file, so the destination only ever receives a complete,
//! decrypted file.
//!
//! Relocation is the commit point. Cancellation is checked once before it and
//! ignored after it: the destination may have replaced an earlier file, and
//! removing it would lose both.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use cloudstore_core::crypto::SymmetricKey;
use cloudstore_core::ports::{FileSystemPort, ObjectTransport};
use cloudstore_core::transfer::{DownloadError, DownloadProgress, RecordId, TransferReporter};

use super::WorkerDeps;
use super::destination::DownloadDestination;
use crate::progress::ThrottledReporter;

type Reporter = ThrottledReporter<DownloadProgress, PathBuf, DownloadError>;

/// A download to be executed by the worker.
pub(crate) struct DownloadJob {
    /// The file being downloaded.
    pub id: RecordId,
    /// Name used when the output is a directory.
    pub file_name: String,
    /// Directory or file path requested by the caller.
    pub output: PathBuf,
    /// Decryption key, if the object was sealed.
    pub key: Option<SymmetricKey>,
}

/// Run a download job to completion and deliver its result.
pub(crate) async fn run<T, S>(
    job: DownloadJob,
    deps: WorkerDeps<T, S>,
    reporter: TransferReporter<DownloadProgress, PathBuf, DownloadError>,
) where
    T: ObjectTransport,
    S: FileSystemPort + 'static,
{
    let cancel = reporter.cancellation_token().clone();
    let mut reporter = ThrottledReporter::new(reporter, deps.throttle());

    let staging_path = deps.fs.staging_path(job.id);
    let destination =
        DownloadDestination::resolve(deps.fs.as_ref(), &job.output, &job.file_name, staging_path)
            .await;

    let staged = tokio::select! {
        biased;

        () = cancel.cancelled() => Err(DownloadError::Cancelled),

        result = stage(&job, &deps, &destination.staging_path, &mut reporter) => result,
    };

    let placed = match staged {
        Ok(completed) => place(&deps, &destination, &cancel, completed, &mut reporter).await,
        Err(e) => Err(e),
    };

    match placed {
        Ok(path) => {
            tracing::info!(id = %job.id, path = %path.display(), "Download completed");
            reporter.into_inner().commit(path);
        }
        Err(e) => {
            discard(deps.fs.as_ref(), &destination.staging_path).await;
            if e.is_cancelled() {
                tracing::info!(id = %job.id, "Download cancelled");
            } else {
                tracing::warn!(id = %job.id, error = %e, "Download failed");
            }
            reporter.into_inner().finish(Err(e));
        }
    }
}

/// Fetch the object into the staging file and decrypt it there.
///
/// Returns the number of bytes received.
async fn stage<T, S>(
    job: &DownloadJob,
    deps: &WorkerDeps<T, S>,
    staging_path: &Path,
    reporter: &mut Reporter,
) -> Result<u64, DownloadError>
where
    T: ObjectTransport,
    S: FileSystemPort,
{
    let mut object = deps.transport.fetch(&deps.config.zone, job.id).await?;
    let total = object.size;
    reporter.report_now(DownloadProgress::new(0, total));

    // Small transport chunks are coalesced into writes of `chunk_size` bytes.
    let write_size = deps.config.chunk_size;
    let mut pending = Vec::with_capacity(write_size);
    let mut completed = 0u64;
    let mut created = false;
    while let Some(chunk) = object.chunks.recv().await {
        let chunk = chunk?;
        completed += chunk.len() as u64;
        pending.extend_from_slice(&chunk);
        if pending.len() >= write_size {
            deps.fs.append(staging_path, &pending).await?;
            pending.clear();
            created = true;
        }
        reporter.report(DownloadProgress::new(completed, total));
    }

    if !pending.is_empty() || !created {
        deps.fs.append(staging_path, &pending).await?;
    }

    if let Some(expected) = total {
        if completed != expected {
            tracing::warn!(
                id = %job.id,
                expected,
                received = completed,
                "Object body ended early"
            );
            return Err(DownloadError::Unknown);
        }
    }

    if let Some(key) = &job.key {
        let sealed = deps.fs.read(staging_path).await?;
        let plaintext = key.open(&sealed)?;
        deps.fs.write(staging_path, &plaintext).await?;
        tracing::debug!(id = %job.id, "Decrypted staged download");
    }

    Ok(completed)
}

/// Move the staged file into place and publish the final snapshot.
///
/// Once relocation starts the download is committed.
async fn place<S: FileSystemPort>(
    deps: &WorkerDeps<impl ObjectTransport, S>,
    destination: &DownloadDestination,
    cancel: &CancellationToken,
    completed: u64,
    reporter: &mut Reporter,
) -> Result<PathBuf, DownloadError> {
    if cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    deps.fs
        .relocate(&destination.staging_path, &destination.final_path)
        .await?;

    reporter.report_now(DownloadProgress::new(completed, Some(completed)));
    Ok(destination.final_path.clone())
}

async fn discard<S: FileSystemPort + ?Sized>(fs: &S, path: &Path) {
    if let Err(e) = fs.remove(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged download");
    }
}
