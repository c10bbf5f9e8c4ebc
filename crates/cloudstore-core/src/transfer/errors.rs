//! Transfer error taxonomy.
//!
//! These errors are closed sets: backends map their own failure codes into
//! them and anything unmapped becomes `Unknown`. They are serializable and do
//! not hold `std::io::Error` directly; disk failures capture the kind and
//! message as strings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::crypto::CryptoError;

use super::aggregate::TransferFailure;
use super::types::RecordId;

/// Error type for download and delete operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// The download was cancelled.
    #[error("Cancelled")]
    Cancelled,

    /// Downloaded data could not be decrypted.
    #[error(transparent)]
    Decryption(#[from] CryptoError),

    /// A disk operation failed.
    #[error("{message}")]
    Disk {
        /// The kind of I/O error (e.g., "`NotFound`", "`PermissionDenied`").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// The requested item was not found on the server.
    #[error("Item not found")]
    ItemNotFound,

    /// Several files failed, keyed by file identifier.
    #[error("{}", count_summary(.0.len()))]
    Multiple(HashMap<RecordId, DownloadError>),

    /// The network is temporarily unavailable.
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// The storage service is temporarily unavailable.
    #[error("Service unavailable. Try again later")]
    ServiceUnavailable,

    /// The user is not signed in.
    #[error("Sign-in required")]
    NotAuthenticated,

    /// The signed-in user may not access the file.
    #[error("No permission")]
    Unauthorized,

    /// Only expected during development; do not branch on it in production.
    #[error("{0}")]
    Development(String),

    /// An unclassified backend error.
    #[error("Unknown error")]
    Unknown,
}

impl DownloadError {
    /// Create a disk error from kind and message strings.
    pub fn disk(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Disk {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create a disk error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Disk {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a development diagnostic.
    pub fn development(reason: impl Into<String>) -> Self {
        Self::Development(reason.into())
    }

    /// Check if this error is transient (the caller may retry later).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable | Self::ServiceUnavailable)
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Per-file errors if this is an aggregate.
    #[must_use]
    pub const fn errors(&self) -> Option<&HashMap<RecordId, Self>> {
        match self {
            Self::Multiple(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

impl TransferFailure for DownloadError {
    fn cancelled() -> Self {
        Self::Cancelled
    }

    fn unknown() -> Self {
        Self::Unknown
    }

    fn from_map(errors: HashMap<RecordId, Self>) -> Self {
        Self::Multiple(errors)
    }

    fn into_map(self) -> Result<HashMap<RecordId, Self>, Self> {
        match self {
            Self::Multiple(errors) => Ok(errors),
            other => Err(other),
        }
    }

    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }
}

/// Error type for upload operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum UploadError {
    /// The upload was cancelled.
    #[error("Cancelled")]
    Cancelled,

    /// The payload could not be encrypted for transport.
    #[error(transparent)]
    Encryption(#[from] CryptoError),

    /// There is no data to upload.
    #[error("No data to upload")]
    NoData,

    /// The network is temporarily unavailable.
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// The storage service is temporarily unavailable.
    #[error("Service unavailable. Try again later")]
    ServiceUnavailable,

    /// Several files failed, keyed by file identifier.
    #[error("{}", count_summary(.0.len()))]
    Multiple(HashMap<RecordId, UploadError>),

    /// The user is not signed in.
    #[error("Sign-in required")]
    NotAuthenticated,

    /// The signed-in user may not upload the file.
    #[error("No permission")]
    Unauthorized,

    /// The remote zone does not exist yet.
    #[error("Zone not found: {name}")]
    ZoneNotFound {
        /// Name of the missing zone.
        name: String,
    },

    /// Only expected during development; do not branch on it in production.
    #[error("{0}")]
    Development(String),

    /// An unclassified backend error.
    #[error("Unknown error")]
    Unknown,
}

impl UploadError {
    /// Create a zone-not-found error.
    pub fn zone_not_found(name: impl Into<String>) -> Self {
        Self::ZoneNotFound { name: name.into() }
    }

    /// Create a development diagnostic.
    pub fn development(reason: impl Into<String>) -> Self {
        Self::Development(reason.into())
    }

    /// Check if this error is transient (the caller may retry later).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable | Self::ServiceUnavailable)
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Per-file errors if this is an aggregate.
    #[must_use]
    pub const fn errors(&self) -> Option<&HashMap<RecordId, Self>> {
        match self {
            Self::Multiple(errors) => Some(errors),
            _ => None,
        }
    }
}

impl TransferFailure for UploadError {
    fn cancelled() -> Self {
        Self::Cancelled
    }

    fn unknown() -> Self {
        Self::Unknown
    }

    fn from_map(errors: HashMap<RecordId, Self>) -> Self {
        Self::Multiple(errors)
    }

    fn into_map(self) -> Result<HashMap<RecordId, Self>, Self> {
        match self {
            Self::Multiple(errors) => Ok(errors),
            other => Err(other),
        }
    }

    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }
}

fn count_summary(count: usize) -> String {
    if count == 1 {
        "1 error".to_string()
    } else {
        format!("{count} errors")
    }
}
