//! Operation handles.
//!
//! Every transfer hands the caller a [`TransferHandle`]: a finite stream of
//! progress snapshots followed by exactly one terminal result. The worker
//! driving the transfer owns the matching [`TransferReporter`].
//!
//! # Guarantees
//!
//! - Snapshots arrive in non-decreasing `completed_bytes` order; the reporter
//!   drops any snapshot that would go backwards.
//! - Once cancellation is requested, [`TransferReporter::finish`] turns a
//!   success into the cancellation error, so the success path is never taken
//!   afterwards.
//! - A worker that has passed its commit point (the destination file was
//!   replaced, or the remote store acknowledged the body) delivers through
//!   [`TransferReporter::commit`]. Cancellation no longer applies there and the
//!   success stands.
//! - Dropping an unfinished handle cancels the transfer.

use std::convert::Infallible;
use std::marker::PhantomData;
use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::aggregate::TransferFailure;
use super::errors::{DownloadError, UploadError};
use super::progress::{DownloadProgress, UploadProgress};
use super::types::{Downloadable, RecordId};

/// A progress value carried by an operation handle.
pub trait ProgressSnapshot: Copy + Send + 'static {
    /// Bytes transferred so far.
    fn completed_bytes(&self) -> u64;
}

impl ProgressSnapshot for DownloadProgress {
    fn completed_bytes(&self) -> u64 {
        self.completed_bytes
    }
}

impl ProgressSnapshot for UploadProgress {
    fn completed_bytes(&self) -> u64 {
        self.completed_bytes
    }
}

/// Deletions report no progress.
impl ProgressSnapshot for Infallible {
    fn completed_bytes(&self) -> u64 {
        match *self {}
    }
}

/// Caller side of an in-flight transfer.
#[derive(Debug)]
pub struct TransferHandle<P, T, E> {
    id: RecordId,
    progress: mpsc::UnboundedReceiver<P>,
    outcome: oneshot::Receiver<Result<T, E>>,
    token: CancellationToken,
    guard: DropGuard,
}

/// Handle for a single-file download; succeeds with the final file path.
pub type DownloadOperation = TransferHandle<DownloadProgress, PathBuf, DownloadError>;

/// Handle for a single-file upload; succeeds with the updated uploadable.
pub type UploadOperation<U> = TransferHandle<UploadProgress, U, UploadError>;

impl<P, T, E> TransferHandle<P, T, E>
where
    P: ProgressSnapshot,
    T: Send + 'static,
    E: TransferFailure,
{
    /// Create a connected handle and reporter for the file `id`.
    pub fn channel(id: RecordId) -> (Self, TransferReporter<P, T, E>) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let token = CancellationToken::new();

        let handle = Self {
            id,
            progress: progress_rx,
            outcome: outcome_rx,
            token: token.clone(),
            guard: token.clone().drop_guard(),
        };
        let reporter = TransferReporter {
            id,
            progress: progress_tx,
            outcome: outcome_tx,
            token,
            last_completed: None,
        };
        (handle, reporter)
    }

    /// Identifier of the file being transferred.
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// Request cancellation. Repeated calls have no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A token that cancels this transfer, for wiring into a parent scope.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the next snapshot; `None` once the transfer has ended.
    pub async fn next_progress(&mut self) -> Option<P> {
        self.progress.recv().await
    }

    /// Take a snapshot if one is ready, without waiting.
    pub fn try_progress(&mut self) -> Option<P> {
        self.progress.try_recv().ok()
    }

    /// Wait for the terminal result, discarding unread progress.
    pub async fn finish(self) -> Result<T, E> {
        let Self {
            outcome,
            token,
            guard,
            ..
        } = self;
        let received = outcome.await;
        // The transfer is over; dropping the guard must not flag it as cancelled.
        drop(guard.disarm());

        match received {
            Ok(result) => result,
            Err(_) if token.is_cancelled() => Err(E::cancelled()),
            Err(_) => {
                tracing::warn!("Transfer worker ended without reporting a result");
                Err(E::unknown())
            }
        }
    }

    /// Feed every snapshot to `on_progress`, then wait for the terminal result.
    pub async fn finish_with<F>(mut self, mut on_progress: F) -> Result<T, E>
    where
        F: FnMut(P) + Send,
    {
        while let Some(snapshot) = self.progress.recv().await {
            on_progress(snapshot);
        }
        self.finish().await
    }
}

/// Worker side of an in-flight transfer.
#[derive(Debug)]
pub struct TransferReporter<P, T, E> {
    id: RecordId,
    progress: mpsc::UnboundedSender<P>,
    outcome: oneshot::Sender<Result<T, E>>,
    token: CancellationToken,
    last_completed: Option<u64>,
}

impl<P, T, E> TransferReporter<P, T, E>
where
    P: ProgressSnapshot,
    T: Send + 'static,
    E: TransferFailure,
{
    /// Identifier of the file being transferred.
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// The token the caller cancels through.
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the caller asked to cancel.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the caller asks to cancel.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Publish a snapshot. Returns `false` if it was not delivered.
    pub fn report(&mut self, snapshot: P) -> bool {
        if self.token.is_cancelled() {
            return false;
        }

        let completed = snapshot.completed_bytes();
        if self.last_completed.is_some_and(|last| completed < last) {
            tracing::debug!(id = %self.id, completed, "Dropping regressing progress snapshot");
            return false;
        }

        self.last_completed = Some(completed);
        self.progress.send(snapshot).is_ok()
    }

    /// Deliver the terminal result and close the progress stream.
    pub fn finish(self, result: Result<T, E>) {
        let result = match result {
            Ok(_) if self.token.is_cancelled() => {
                tracing::debug!(id = %self.id, "Success after cancellation reported as cancelled");
                Err(E::cancelled())
            }
            other => other,
        };
        self.deliver(result);
    }

    /// Deliver the success of a transfer that has already taken effect.
    ///
    /// Unlike [`finish`](Self::finish), a pending cancellation does not turn
    /// this into the cancellation error.
    pub fn commit(self, value: T) {
        if self.token.is_cancelled() {
            tracing::debug!(id = %self.id, "Cancellation arrived after commit");
        }
        self.deliver(Ok(value));
    }

    fn deliver(self, result: Result<T, E>) {
        if self.outcome.send(result).is_err() {
            tracing::debug!(id = %self.id, "Transfer handle dropped before completion");
        }
    }
}

/// Handle for a remote deletion of a `F`.
#[derive(Debug)]
pub struct DeleteOperation<F> {
    handle: TransferHandle<Infallible, (), DownloadError>,
    file: PhantomData<fn() -> F>,
}

impl<F: Downloadable> DeleteOperation<F> {
    /// Create a connected deletion handle and reporter.
    pub fn channel(id: RecordId) -> (Self, TransferReporter<Infallible, (), DownloadError>) {
        let (handle, reporter) = TransferHandle::channel(id);
        (
            Self {
                handle,
                file: PhantomData,
            },
            reporter,
        )
    }

    /// Identifier of the file being deleted.
    pub const fn id(&self) -> RecordId {
        self.handle.id()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Wait for the deletion to finish.
    pub async fn finish(self) -> Result<(), DownloadError> {
        self.handle.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type TestHandle = TransferHandle<DownloadProgress, u32, DownloadError>;

    #[tokio::test]
    async fn test_progress_then_result() {
        let (handle, mut reporter) = TestHandle::channel(RecordId::new());

        tokio::spawn(async move {
            reporter.report(DownloadProgress::new(10, Some(20)));
            reporter.report(DownloadProgress::new(20, Some(20)));
            reporter.finish(Ok(7));
        });

        let mut seen = Vec::new();
        let result = handle.finish_with(|p| seen.push(p.completed_bytes)).await;

        assert_eq!(result, Ok(7));
        assert_eq!(seen, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_regressing_snapshots_are_dropped() {
        let (mut handle, mut reporter) = TestHandle::channel(RecordId::new());

        assert!(reporter.report(DownloadProgress::new(50, None)));
        assert!(!reporter.report(DownloadProgress::new(40, None)));
        assert!(reporter.report(DownloadProgress::new(50, None)));
        reporter.finish(Ok(1));

        assert_eq!(
            handle.next_progress().await.map(|p| p.completed_bytes),
            Some(50)
        );
        assert_eq!(
            handle.next_progress().await.map(|p| p.completed_bytes),
            Some(50)
        );
        assert_eq!(handle.next_progress().await, None);
    }

    #[tokio::test]
    async fn test_success_after_cancel_becomes_cancelled() {
        let (handle, reporter) = TestHandle::channel(RecordId::new());

        handle.cancel();
        handle.cancel();
        assert!(reporter.is_cancelled());
        reporter.finish(Ok(3));

        assert_eq!(handle.finish().await, Err(DownloadError::Cancelled));
    }

    #[tokio::test]
    async fn test_committed_success_survives_cancel() {
        let (handle, reporter) = TestHandle::channel(RecordId::new());
        assert_eq!(reporter.id(), handle.id());

        handle.cancel();
        reporter.commit(9);

        assert_eq!(handle.finish().await, Ok(9));
    }

    #[tokio::test]
    async fn test_dropped_reporter_yields_unknown() {
        let (handle, reporter) = TestHandle::channel(RecordId::new());
        drop(reporter);
        assert_eq!(handle.finish().await, Err(DownloadError::Unknown));
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_worker() {
        let (handle, reporter) = TestHandle::channel(RecordId::new());
        drop(handle);

        tokio::time::timeout(Duration::from_secs(1), reporter.cancelled())
            .await
            .expect("dropping the handle should cancel the transfer");
    }

    #[tokio::test]
    async fn test_finished_handle_does_not_cancel() {
        let (handle, reporter) = TestHandle::channel(RecordId::new());
        let token = handle.cancellation_token();
        reporter.finish(Ok(0));

        assert_eq!(handle.finish().await, Ok(0));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_deletion_handle_reports_no_progress() {
        let id = RecordId::new();
        let (deletion, reporter) = DeleteOperation::<crate::transfer::RemoteFile>::channel(id);
        assert_eq!(deletion.id(), id);
        reporter.finish(Ok(()));

        let result = tokio_test::block_on(deletion.finish());
        assert_eq!(result, Ok(()));
    }
}
