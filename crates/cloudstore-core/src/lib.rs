//! Core transfer contract for cloudstore.
//!
//! This crate holds the pure contract between callers and storage backends:
//!
//! - `transfer` - transfer units, progress snapshots, error taxonomy and the
//!   operation handle returned by every transfer
//! - `ports` - the `FileDownloader` / `FileDeleter` / `FileUploader` contracts
//!   plus the file-system and object-transport seams backends plug into
//! - `crypto` - the symmetric key and the seal/open step applied to payloads
//! - `config` - backend configuration
//!
//! Concrete backends live in `cloudstore-transfer`.
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod crypto;
pub mod ports;
pub mod transfer;

// Re-export commonly used types for convenience
pub use config::{CloudStoreConfig, ConfigError, DEFAULT_ZONE};
pub use crypto::{CryptoError, SymmetricKey};
pub use ports::{
    FileDeleter, FileDownloader, FileSystemError, FileSystemPort, FileUploader, ObjectTransport,
    RemoteObject, TransportError,
};
pub use transfer::{
    Aggregator, DeleteOperation, DownloadError, DownloadOperation, DownloadProgress, Downloadable,
    LocalFile, ProgressSnapshot, RecordId, RemoteFile, TransferFailure, TransferHandle,
    TransferReporter, UploadError, UploadOperation, UploadProgress, Uploadable,
};

// Silence unused dev-dependency warnings for crates only used in some test modules
#[cfg(test)]
use tokio_test as _;
