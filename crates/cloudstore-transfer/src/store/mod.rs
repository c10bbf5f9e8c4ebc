//! Cloud store backend.
//!
//! `CloudStore` implements the transfer contracts on top of an
//! `ObjectTransport` (the vendor seam) and a `FileSystemPort`.
//!
//! # Architecture
//!
//! - **Contract methods**: run the synchronous precondition checks, create the
//!   operation handle, and spawn one worker task per operation
//! - **Workers** (`download`, `upload`, `delete`): drive the transport, write
//!   only to their reporter, and clean up on failure or cancellation
//! - **Destination**: resolves where a download lands
//!
//! Workers race their I/O against the handle's cancellation token with
//! `tokio::select!`, so cancellation takes effect at the next await point.
//! A worker stops listening once it commits: a download when it starts
//! relocating into the destination, an upload when the transport acknowledges
//! the store.

mod delete;
mod destination;
mod download;
mod upload;

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Handle;

use cloudstore_core::config::CloudStoreConfig;
use cloudstore_core::crypto::SymmetricKey;
use cloudstore_core::ports::{FileDownloader, FileSystemPort, FileUploader, ObjectTransport};
use cloudstore_core::transfer::{
    DeleteOperation, DownloadError, DownloadOperation, Downloadable, TransferFailure,
    TransferHandle, UploadError, UploadOperation, Uploadable,
};

use crate::fs::LocalFileSystem;
use crate::progress::ProgressThrottle;

pub use destination::DownloadDestination;

/// Dependencies shared by every worker of one store.
///
/// Cloned Arc references, so workers run independently of the store value.
pub(crate) struct WorkerDeps<T, S> {
    pub transport: Arc<T>,
    pub fs: Arc<S>,
    pub config: CloudStoreConfig,
}

impl<T, S> Clone for WorkerDeps<T, S> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            fs: Arc::clone(&self.fs),
            config: self.config.clone(),
        }
    }
}

impl<T, S> WorkerDeps<T, S> {
    fn throttle(&self) -> ProgressThrottle {
        ProgressThrottle::new(self.config.progress_interval)
    }
}

/// Storage backend implementing `FileDownloader` and `FileUploader`.
pub struct CloudStore<T, S = LocalFileSystem> {
    deps: WorkerDeps<T, S>,
}

impl<T, S> Clone for CloudStore<T, S> {
    fn clone(&self) -> Self {
        Self {
            deps: self.deps.clone(),
        }
    }
}

impl<T: ObjectTransport> CloudStore<T, LocalFileSystem> {
    /// Create a store staging downloads on the local disk.
    pub fn with_local_fs(transport: Arc<T>, config: CloudStoreConfig) -> Self {
        let fs = LocalFileSystem::new(config.staging_directory.clone());
        Self::new(transport, Arc::new(fs), config)
    }
}

impl<T: ObjectTransport, S: FileSystemPort + 'static> CloudStore<T, S> {
    /// Create a store from its collaborators.
    pub fn new(transport: Arc<T>, fs: Arc<S>, config: CloudStoreConfig) -> Self {
        Self {
            deps: WorkerDeps {
                transport,
                fs,
                config,
            },
        }
    }

    /// The zone this store reads and writes.
    pub fn zone(&self) -> &str {
        &self.deps.config.zone
    }

    /// The configuration in use.
    pub const fn config(&self) -> &CloudStoreConfig {
        &self.deps.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.deps.transport
    }
}

/// Runtime to spawn workers on, or a synchronous failure when there is none.
fn runtime<E: TransferFailure>(
    development: impl FnOnce(&'static str) -> E,
) -> Result<Handle, E> {
    Handle::try_current()
        .map_err(|_| development("transfers must be started from within a Tokio runtime"))
}

impl<F, T, S> FileDownloader<F> for CloudStore<T, S>
where
    F: Downloadable,
    T: ObjectTransport,
    S: FileSystemPort + 'static,
{
    type Deleter = DeleteOperation<F>;

    fn download_file(
        &self,
        file: &F,
        output: &Path,
        decryption_key: Option<&SymmetricKey>,
    ) -> Result<DownloadOperation, DownloadError> {
        if !self.deps.transport.is_authenticated() {
            return Err(DownloadError::NotAuthenticated);
        }
        let runtime = runtime(DownloadError::development)?;

        let id = file.record_identifier();
        let (handle, reporter) = TransferHandle::channel(id);
        let job = download::DownloadJob {
            id,
            file_name: file.file_name(),
            output: output.to_path_buf(),
            key: decryption_key.cloned(),
        };

        tracing::debug!(id = %id, output = %output.display(), "Starting download");
        runtime.spawn(download::run(job, self.deps.clone(), reporter));
        Ok(handle)
    }

    fn delete_file(&self, file: &F) -> Result<DeleteOperation<F>, DownloadError> {
        if !self.deps.transport.is_authenticated() {
            return Err(DownloadError::NotAuthenticated);
        }
        let runtime = runtime(DownloadError::development)?;

        let id = file.record_identifier();
        let (operation, reporter) = DeleteOperation::channel(id);

        tracing::debug!(id = %id, "Starting delete");
        runtime.spawn(delete::run(self.deps.clone(), reporter));
        Ok(operation)
    }
}

impl<U, T, S> FileUploader<U> for CloudStore<T, S>
where
    U: Uploadable,
    U::Metadata: Downloadable<Payload = U>,
    T: ObjectTransport,
    S: FileSystemPort + 'static,
{
    fn upload_file(
        &self,
        file: U,
        encryption_key: Option<&SymmetricKey>,
    ) -> Result<UploadOperation<U>, UploadError> {
        if !file.has_payload() {
            return Err(UploadError::NoData);
        }
        if !self.deps.transport.is_authenticated() {
            return Err(UploadError::NotAuthenticated);
        }
        let runtime = runtime(UploadError::development)?;

        let id = file.id();
        let (handle, reporter) = TransferHandle::channel(id);

        tracing::debug!(id = %id, zone = %self.deps.config.zone, "Starting upload");
        runtime.spawn(upload::run(
            file,
            encryption_key.cloned(),
            self.deps.clone(),
            reporter,
        ));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mockall::mock;
    use tokio_util::sync::CancellationToken;

    use cloudstore_core::ports::{FileSystemError, RemoteObject, TransportError};
    use cloudstore_core::transfer::{LocalFile, RecordId, RemoteFile};

    use crate::memory::MemoryTransport;

    mock! {
        pub Fs {}

        #[async_trait]
        impl FileSystemPort for Fs {
            async fn file_size(&self, path: &Path) -> Result<u64, FileSystemError>;
            async fn is_directory(&self, path: &Path) -> bool;
            fn staging_path(&self, id: RecordId) -> PathBuf;
            async fn append(&self, path: &Path, bytes: &[u8]) -> Result<(), FileSystemError>;
            async fn read(&self, path: &Path) -> Result<Vec<u8>, FileSystemError>;
            async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), FileSystemError>;
            async fn relocate(&self, from: &Path, to: &Path) -> Result<(), FileSystemError>;
            async fn remove(&self, path: &Path) -> Result<(), FileSystemError>;
        }
    }

    const ZONE: &str = "test-zone";

    /// Token of the operation under test, cancelled from inside a port call.
    #[derive(Default)]
    struct CancelSlot(Mutex<Option<CancellationToken>>);

    impl CancelSlot {
        fn arm(&self, token: CancellationToken) {
            *self.0.lock().unwrap() = Some(token);
        }

        fn fire(&self) {
            if let Some(token) = self.0.lock().unwrap().as_ref() {
                token.cancel();
            }
        }
    }

    /// Local disk that cancels the download while relocating it.
    struct CancelOnRelocate {
        disk: LocalFileSystem,
        slot: CancelSlot,
    }

    #[async_trait]
    impl FileSystemPort for CancelOnRelocate {
        async fn file_size(&self, path: &Path) -> Result<u64, FileSystemError> {
            self.disk.file_size(path).await
        }

        async fn is_directory(&self, path: &Path) -> bool {
            self.disk.is_directory(path).await
        }

        fn staging_path(&self, id: RecordId) -> PathBuf {
            self.disk.staging_path(id)
        }

        async fn append(&self, path: &Path, bytes: &[u8]) -> Result<(), FileSystemError> {
            self.disk.append(path, bytes).await
        }

        async fn read(&self, path: &Path) -> Result<Vec<u8>, FileSystemError> {
            self.disk.read(path).await
        }

        async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), FileSystemError> {
            self.disk.write(path, bytes).await
        }

        async fn relocate(&self, from: &Path, to: &Path) -> Result<(), FileSystemError> {
            let relocated = self.disk.relocate(from, to).await;
            self.slot.fire();
            relocated
        }

        async fn remove(&self, path: &Path) -> Result<(), FileSystemError> {
            self.disk.remove(path).await
        }
    }

    /// In-memory transport that cancels the upload once the store is acknowledged.
    struct CancelOnStore {
        objects: MemoryTransport,
        slot: CancelSlot,
    }

    #[async_trait]
    impl ObjectTransport for CancelOnStore {
        fn is_authenticated(&self) -> bool {
            self.objects.is_authenticated()
        }

        async fn fetch(&self, zone: &str, id: RecordId) -> Result<RemoteObject, TransportError> {
            self.objects.fetch(zone, id).await
        }

        async fn store(
            &self,
            zone: &str,
            id: RecordId,
            body: Vec<u8>,
            progress: &(dyn Fn(u64) + Send + Sync),
        ) -> Result<(), TransportError> {
            let stored = self.objects.store(zone, id, body, progress).await;
            self.slot.fire();
            stored
        }

        async fn delete(&self, zone: &str, id: RecordId) -> Result<(), TransportError> {
            self.objects.delete(zone, id).await
        }
    }

    fn store_with(transport: MemoryTransport, fs: MockFs) -> CloudStore<MemoryTransport, MockFs> {
        CloudStore::new(
            Arc::new(transport),
            Arc::new(fs),
            CloudStoreConfig::new(ZONE),
        )
    }

    #[tokio::test]
    async fn test_signed_out_download_touches_nothing() {
        let transport = MemoryTransport::with_zone(ZONE);
        transport.set_authenticated(false);
        // No expectations: any file-system call fails the test.
        let store = store_with(transport, MockFs::new());

        let result = store.download_file(&RemoteFile::generate(), Path::new("/tmp/out.bin"), None);
        assert_eq!(result.unwrap_err(), DownloadError::NotAuthenticated);

        let result = store.delete_file(&RemoteFile::generate());
        assert_eq!(result.unwrap_err(), DownloadError::NotAuthenticated);
        assert_eq!(store.transport().call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected_before_authentication() {
        let transport = MemoryTransport::with_zone(ZONE);
        transport.set_authenticated(false);
        let store = store_with(transport, MockFs::new());

        let empty = LocalFile::new(RemoteFile::generate(), None);
        assert_eq!(store.upload_file(empty, None).unwrap_err(), UploadError::NoData);

        let signed_out = LocalFile::from_bytes(b"x".to_vec());
        assert_eq!(
            store.upload_file(signed_out, None).unwrap_err(),
            UploadError::NotAuthenticated
        );
        assert_eq!(store.transport().call_count(), 0);
    }

    #[test]
    fn test_starting_outside_a_runtime_fails_synchronously() {
        let store = store_with(MemoryTransport::with_zone(ZONE), MockFs::new());

        let result = store.download_file(&RemoteFile::generate(), Path::new("/tmp/out.bin"), None);
        assert!(matches!(result, Err(DownloadError::Development(_))));

        let result = store.upload_file(LocalFile::from_bytes(b"x".to_vec()), None);
        assert!(matches!(result, Err(UploadError::Development(_))));
    }

    #[tokio::test]
    async fn test_staging_failure_cleans_up_and_reports_disk_error() {
        let transport = MemoryTransport::with_zone(ZONE);
        let file = RemoteFile::generate();
        transport.insert(ZONE, file.record_identifier(), vec![7u8; 10]);

        let staging = PathBuf::from("/staging/file.partial");
        let mut fs = MockFs::new();
        let staged = staging.clone();
        fs.expect_staging_path().return_const(staged);
        fs.expect_is_directory().returning(|_| false);
        fs.expect_append().times(1).returning(|path, _| {
            Err(FileSystemError::io(path.to_path_buf(), io::Error::other("disk full")))
        });
        fs.expect_relocate().never();
        let removed = staging.clone();
        fs.expect_remove()
            .withf(move |path| path.to_path_buf() == removed)
            .times(1)
            .returning(|_| Ok(()));

        let store = store_with(transport, fs);
        let operation = store
            .download_file(&file, Path::new("/out/file.bin"), None)
            .unwrap();

        let error = operation.finish().await.unwrap_err();
        assert!(matches!(error, DownloadError::Disk { .. }), "got {error:?}");
    }

    #[tokio::test]
    async fn test_cancel_during_relocate_keeps_the_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.txt");
        std::fs::write(&out, b"user's previous report").unwrap();
        let staging = dir.path().join("staging");

        let transport = MemoryTransport::with_zone(ZONE);
        let file = RemoteFile::generate();
        transport.insert(ZONE, file.record_identifier(), b"new report".to_vec());
        let fs = Arc::new(CancelOnRelocate {
            disk: LocalFileSystem::new(&staging),
            slot: CancelSlot::default(),
        });
        let store = CloudStore::new(
            Arc::new(transport),
            Arc::clone(&fs),
            CloudStoreConfig::new(ZONE),
        );

        let operation = store.download_file(&file, &out, None).unwrap();
        let token = operation.cancellation_token();
        fs.slot.arm(token.clone());

        assert_eq!(operation.finish().await, Ok(out.clone()));
        assert!(token.is_cancelled());
        assert_eq!(std::fs::read(&out).unwrap(), b"new report");
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_store_acknowledged_keeps_the_object() {
        let transport = Arc::new(CancelOnStore {
            objects: MemoryTransport::with_zone(ZONE),
            slot: CancelSlot::default(),
        });
        let store = CloudStore::new(
            Arc::clone(&transport),
            Arc::new(MockFs::new()),
            CloudStoreConfig::new(ZONE),
        );

        let file = LocalFile::from_bytes(b"second version".to_vec());
        let id = file.id();
        transport.objects.insert(ZONE, id, b"first version".to_vec());

        let operation = store.upload_file(file, None).unwrap();
        let token = operation.cancellation_token();
        transport.slot.arm(token.clone());

        let uploaded = operation.finish().await.unwrap();
        assert!(token.is_cancelled());
        assert_eq!(uploaded.metadata().storage().map(Uploadable::id), Some(id));
        assert_eq!(
            transport.objects.get(ZONE, id).as_deref(),
            Some(&b"second version"[..])
        );
    }

    #[tokio::test]
    async fn test_config_accessors() {
        let store = store_with(MemoryTransport::with_zone(ZONE), MockFs::new());
        assert_eq!(store.zone(), ZONE);
        assert_eq!(store.config().zone, ZONE);
        assert_eq!(store.clone().zone(), ZONE);
    }
}
