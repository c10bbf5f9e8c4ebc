//! Port definitions (trait abstractions) for transfers and their collaborators.
//!
//! Ports define the interfaces the core expects from infrastructure. They
//! contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No vendor SDK types in any signature
//! - Preconditions are checked synchronously: contract methods return
//!   `Result<Handle, E>` so "never started" stays distinct from
//!   "started and failed"
//! - Contracts are generic over the transfer-unit type and dispatched statically

pub mod filesystem;
pub mod object_transport;
pub mod transfer;

pub use filesystem::{FileSystemError, FileSystemPort};
pub use object_transport::{ObjectTransport, RemoteObject, TransportError};
pub use transfer::{FileDeleter, FileDownloader, FileUploader};
