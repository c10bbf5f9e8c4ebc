//! Upload worker.
//!
//! Seals the payload when a key is supplied, then hands the body to the
//! transport. The transport publishes the object only once the whole body is
//! received, so a cancelled or failed upload never leaves a partial object.
//!
//! An acknowledged store is the commit point. The object may have replaced an
//! earlier version under the same identifier, so a cancellation arriving after
//! the acknowledgement is ignored rather than undone.

use std::sync::{Mutex, PoisonError};

use cloudstore_core::crypto::SymmetricKey;
use cloudstore_core::ports::{FileSystemPort, ObjectTransport};
use cloudstore_core::transfer::{
    Downloadable, TransferReporter, UploadError, UploadProgress, Uploadable,
};

use super::WorkerDeps;
use crate::progress::ThrottledReporter;

/// Run an upload to completion and deliver its result.
pub(crate) async fn run<U, T, S>(
    file: U,
    key: Option<SymmetricKey>,
    deps: WorkerDeps<T, S>,
    reporter: TransferReporter<UploadProgress, U, UploadError>,
) where
    U: Uploadable,
    U::Metadata: Downloadable<Payload = U>,
    T: ObjectTransport,
    S: FileSystemPort + 'static,
{
    let id = file.id();
    let cancel = reporter.cancellation_token().clone();
    let reporter = Mutex::new(ThrottledReporter::new(reporter, deps.throttle()));

    let stored = match prepare_body(&file, key.as_ref()) {
        Ok(body) => {
            let total = body.len() as u64;
            let publish = |snapshot: UploadProgress, forced: bool| {
                let mut reporter = reporter.lock().unwrap_or_else(PoisonError::into_inner);
                if forced {
                    reporter.report_now(snapshot);
                } else {
                    reporter.report(snapshot);
                }
            };
            publish(UploadProgress::new(0, total), true);

            let on_progress = |sent: u64| {
                publish(UploadProgress::new(sent.min(total), total), false);
            };
            let stored = tokio::select! {
                biased;

                () = cancel.cancelled() => Err(UploadError::Cancelled),

                result = deps.transport.store(&deps.config.zone, id, body, &on_progress) => {
                    result.map_err(UploadError::from)
                }
            };
            if stored.is_ok() {
                publish(UploadProgress::new(total, total), true);
            }
            stored
        }
        Err(e) => Err(e),
    };

    let reporter = reporter
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .into_inner();

    match stored {
        Ok(()) => {
            tracing::info!(id = %id, zone = %deps.config.zone, "Upload completed");
            reporter.commit(with_local_storage(file));
        }
        Err(e) => {
            if e.is_cancelled() {
                tracing::info!(id = %id, "Upload cancelled");
            } else {
                tracing::warn!(id = %id, error = %e, "Upload failed");
            }
            reporter.finish(Err(e));
        }
    }
}

/// The bytes to transmit: the payload, sealed when a key is given.
fn prepare_body<U: Uploadable>(
    file: &U,
    key: Option<&SymmetricKey>,
) -> Result<Vec<u8>, UploadError> {
    let payload = file
        .payload()
        .filter(|bytes| !bytes.is_empty())
        .ok_or(UploadError::NoData)?;

    match key {
        Some(key) => Ok(key.seal(payload)?),
        None => Ok(payload.to_vec()),
    }
}

/// Record the uploaded value as the metadata's local storage.
fn with_local_storage<U>(mut file: U) -> U
where
    U: Uploadable,
    U::Metadata: Downloadable<Payload = U>,
{
    let mut stored = file.clone();
    stored.metadata_mut().set_storage(None);
    file.metadata_mut().set_storage(Some(stored));
    file
}
