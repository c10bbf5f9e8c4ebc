//! Transfer domain types, errors, and the operation handle.
//!
//! This module contains the value types every backend and caller share.
//! No networking or file-system access happens here.
//!
//! # Structure
//!
//! - `types` - Identifiers and transfer units (`RecordId`, `Downloadable`, `Uploadable`)
//! - `progress` - Progress snapshots (`DownloadProgress`, `UploadProgress`)
//! - `errors` - The closed error taxonomy (`DownloadError`, `UploadError`)
//! - `aggregate` - Flattening of per-file failures into one `Multiple` value
//! - `operation` - The cancellable handle returned by every transfer

pub mod aggregate;
pub mod errors;
pub mod operation;
pub mod progress;
pub mod types;

// Re-export commonly used types
pub use aggregate::{Aggregator, TransferFailure};
pub use errors::{DownloadError, UploadError};
pub use operation::{
    DeleteOperation, DownloadOperation, ProgressSnapshot, TransferHandle, TransferReporter,
    UploadOperation,
};
pub use progress::{DownloadProgress, UploadProgress};
pub use types::{Downloadable, LocalFile, RecordId, RemoteFile, Uploadable};
