//! Delete worker.

use std::convert::Infallible;

use cloudstore_core::ports::{FileSystemPort, ObjectTransport};
use cloudstore_core::transfer::{DownloadError, TransferReporter};

use super::WorkerDeps;

/// Remove the reporter's object from the configured zone.
pub(crate) async fn run<T, S>(
    deps: WorkerDeps<T, S>,
    reporter: TransferReporter<Infallible, (), DownloadError>,
) where
    T: ObjectTransport,
    S: FileSystemPort + 'static,
{
    let id = reporter.id();
    let result = tokio::select! {
        biased;

        () = reporter.cancelled() => Err(DownloadError::Cancelled),

        result = deps.transport.delete(&deps.config.zone, id) => {
            result.map_err(DownloadError::from)
        }
    };

    match &result {
        Ok(()) => tracing::info!(id = %id, zone = %deps.config.zone, "Deleted remote file"),
        Err(e) if e.is_cancelled() => tracing::info!(id = %id, "Delete cancelled"),
        Err(e) => tracing::warn!(id = %id, error = %e, "Delete failed"),
    }

    reporter.finish(result);
}
