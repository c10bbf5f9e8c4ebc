//! Transfer engine for cloudstore.
//!
//! `CloudStore` implements the `FileDownloader` and `FileUploader` contracts
//! from `cloudstore-core` over any `ObjectTransport`.
//!
//! # Architecture
//!
//! - `store` - the backend: precondition checks, handle creation, and one
//!   worker task per operation
//! - `fs` - `LocalFileSystem`, the staging and relocation adapter
//! - `progress` - throttled progress delivery
//! - `batch` - concurrent multi-file helpers with failure aggregation
//! - `memory` - in-memory transport (`test-utils` feature)
// Test builds link this crate into itself through the `test-utils` dev-dependency.
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod batch;
pub mod fs;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod progress;
mod store;

pub use batch::{delete_all, download_all, upload_all};
pub use fs::LocalFileSystem;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryTransport;
pub use progress::{ProgressThrottle, ThrottledReporter};
pub use store::{CloudStore, DownloadDestination};
