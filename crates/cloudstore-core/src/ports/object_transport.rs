//! Object transport port.
//!
//! This is the seam a vendor SDK adapter implements. The adapter moves opaque
//! bytes in and out of a zone and reports failures as `TransportError`; the
//! transfer engine handles staging, encryption, progress and cancellation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::transfer::{DownloadError, RecordId, UploadError};

/// Vendor-neutral failure codes reported by a transport.
///
/// Only the transfer engine sees these; callers get the closed
/// `DownloadError` / `UploadError` taxonomy.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportError {
    /// No object exists under the identifier.
    #[error("object not found")]
    NotFound,

    /// The zone does not exist.
    #[error("zone not found: {zone}")]
    ZoneNotFound {
        /// Name of the missing zone.
        zone: String,
    },

    /// No signed-in account.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The account may not perform the operation.
    #[error("permission denied")]
    PermissionDenied,

    /// The network is unreachable.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The service is down or overloaded.
    #[error("service unavailable")]
    ServiceUnavailable,

    /// The service asked the client to slow down.
    #[error("rate limited")]
    RateLimited {
        /// Suggested wait before retrying.
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after: Option<Duration>,
    },

    /// The account is out of storage.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// A vendor code with no neutral equivalent.
    #[error("transport error {code}: {message}")]
    Other {
        /// Vendor error code.
        code: i64,
        /// Vendor error message.
        message: String,
    },
}

impl TransportError {
    /// Create a vendor-specific error.
    pub fn other(code: i64, message: impl Into<String>) -> Self {
        Self::Other {
            code,
            message: message.into(),
        }
    }

    /// Map into the download taxonomy. Unmapped codes become `Unknown`.
    #[must_use]
    pub fn into_download_error(self) -> DownloadError {
        match self {
            Self::NotFound | Self::ZoneNotFound { .. } => DownloadError::ItemNotFound,
            Self::NotAuthenticated => DownloadError::NotAuthenticated,
            Self::PermissionDenied => DownloadError::Unauthorized,
            Self::NetworkUnavailable => DownloadError::NetworkUnavailable,
            Self::ServiceUnavailable | Self::RateLimited { .. } => {
                DownloadError::ServiceUnavailable
            }
            unmapped @ (Self::QuotaExceeded | Self::Other { .. }) => {
                tracing::warn!(error = %unmapped, "Unmapped transport error during download");
                DownloadError::Unknown
            }
        }
    }

    /// Map into the upload taxonomy. Unmapped codes become `Unknown`.
    #[must_use]
    pub fn into_upload_error(self) -> UploadError {
        match self {
            Self::ZoneNotFound { zone } => UploadError::ZoneNotFound { name: zone },
            Self::NotAuthenticated => UploadError::NotAuthenticated,
            Self::PermissionDenied => UploadError::Unauthorized,
            Self::NetworkUnavailable => UploadError::NetworkUnavailable,
            Self::ServiceUnavailable | Self::RateLimited { .. } => UploadError::ServiceUnavailable,
            unmapped @ (Self::NotFound | Self::QuotaExceeded | Self::Other { .. }) => {
                tracing::warn!(error = %unmapped, "Unmapped transport error during upload");
                UploadError::Unknown
            }
        }
    }
}

impl From<TransportError> for DownloadError {
    fn from(err: TransportError) -> Self {
        err.into_download_error()
    }
}

impl From<TransportError> for UploadError {
    fn from(err: TransportError) -> Self {
        err.into_upload_error()
    }
}

/// An object being fetched.
#[derive(Debug)]
pub struct RemoteObject {
    /// Size of the stored object, when the service reports it up front.
    pub size: Option<u64>,
    /// Body chunks in order. The channel closes after the last chunk.
    pub chunks: mpsc::Receiver<Result<Vec<u8>, TransportError>>,
}

/// Port for moving opaque objects in and out of a remote zone.
#[async_trait]
pub trait ObjectTransport: Send + Sync + 'static {
    /// Whether an account is signed in. Checked before any operation starts.
    fn is_authenticated(&self) -> bool;

    /// Open the object stored under `id` in `zone`.
    async fn fetch(&self, zone: &str, id: RecordId) -> Result<RemoteObject, TransportError>;

    /// Store `body` under `id` in `zone`.
    ///
    /// `progress` receives the running count of acknowledged bytes. The object
    /// must not become visible under `id` until this returns `Ok`; if the
    /// future is dropped or fails, no partial object may remain.
    async fn store(
        &self,
        zone: &str,
        id: RecordId,
        body: Vec<u8>,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<(), TransportError>;

    /// Delete the object stored under `id` in `zone`.
    async fn delete(&self, zone: &str, id: RecordId) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_mapping() {
        assert_eq!(
            TransportError::NotFound.into_download_error(),
            DownloadError::ItemNotFound
        );
        assert_eq!(
            TransportError::PermissionDenied.into_download_error(),
            DownloadError::Unauthorized
        );
        assert_eq!(
            TransportError::RateLimited { retry_after: None }.into_download_error(),
            DownloadError::ServiceUnavailable
        );
        assert_eq!(
            TransportError::other(-42, "CKErrorServerRejectedRequest").into_download_error(),
            DownloadError::Unknown
        );
    }

    #[test]
    fn test_upload_mapping_keeps_zone_name() {
        assert_eq!(
            UploadError::from(TransportError::ZoneNotFound {
                zone: "photos".to_string()
            }),
            UploadError::zone_not_found("photos")
        );
        assert_eq!(
            TransportError::QuotaExceeded.into_upload_error(),
            UploadError::Unknown
        );
        assert_eq!(
            TransportError::NetworkUnavailable.into_upload_error(),
            UploadError::NetworkUnavailable
        );
    }
}
