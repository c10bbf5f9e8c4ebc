//! Transfer contracts.
//!
//! Backends implement these traits; callers depend only on them.
//!
//! # Usage
//!
//! ```ignore
//! let mut operation = store.download_file(&file, Path::new("/tmp/out.bin"), None)?;
//! while let Some(progress) = operation.next_progress().await {
//!     println!("{:?}", progress.fraction_completed());
//! }
//! let path = operation.finish().await?;
//! ```

use std::path::Path;

use async_trait::async_trait;

use crate::crypto::SymmetricKey;
use crate::transfer::{
    DeleteOperation, DownloadError, DownloadOperation, Downloadable, RecordId, UploadError,
    UploadOperation, Uploadable,
};

/// Retrieves and deletes remote files identified by `F`.
pub trait FileDownloader<F: Downloadable>: Send + Sync {
    /// Handle type returned by [`delete_file`](Self::delete_file).
    type Deleter: FileDeleter<Deletable = F>;

    /// Start downloading `file` into `output`.
    ///
    /// `output` is either an existing directory, in which case the file is
    /// named after its identifier and extension, or the final file path.
    /// Bytes are staged elsewhere and only moved into place once the whole
    /// payload has arrived and, when `decryption_key` is given, decrypted.
    ///
    /// Fails immediately with `DownloadError::NotAuthenticated`, without
    /// returning a handle, when the user is not signed in.
    fn download_file(
        &self,
        file: &F,
        output: &Path,
        decryption_key: Option<&SymmetricKey>,
    ) -> Result<DownloadOperation, DownloadError>;

    /// Start deleting the remote object behind `file`.
    ///
    /// Local storage on `file` is ignored. A missing object ends the
    /// operation with `DownloadError::ItemNotFound`.
    fn delete_file(&self, file: &F) -> Result<Self::Deleter, DownloadError>;
}

/// A deletion in flight. Emits no progress; ends in success or an error.
#[async_trait]
pub trait FileDeleter: Send {
    /// The transfer-unit type being deleted.
    type Deletable: Downloadable;

    /// Identifier of the file being deleted.
    fn target(&self) -> RecordId;

    /// Request cancellation.
    fn cancel(&self);

    /// Wait for the deletion to finish.
    async fn finish(self) -> Result<(), DownloadError>;
}

#[async_trait]
impl<F: Downloadable> FileDeleter for DeleteOperation<F> {
    type Deletable = F;

    fn target(&self) -> RecordId {
        self.id()
    }

    fn cancel(&self) {
        DeleteOperation::<F>::cancel(self);
    }

    async fn finish(self) -> Result<(), DownloadError> {
        DeleteOperation::<F>::finish(self).await
    }
}

/// Sends local files described by `U`.
pub trait FileUploader<U: Uploadable>: Send + Sync {
    /// Start uploading `file`.
    ///
    /// When `encryption_key` is given, the payload is encrypted before it
    /// leaves the process. The key is not retained; the caller manages it.
    ///
    /// Fails immediately with `UploadError::NoData` when the payload is absent
    /// or empty, and with `UploadError::NotAuthenticated` when the user is not
    /// signed in, before any backend call. On success the handle resolves to
    /// `file` with its metadata's storage set to the uploaded value.
    fn upload_file(
        &self,
        file: U,
        encryption_key: Option<&SymmetricKey>,
    ) -> Result<UploadOperation<U>, UploadError>;
}
