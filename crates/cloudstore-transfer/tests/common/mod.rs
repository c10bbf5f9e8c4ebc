//! Common test utilities.
//!
//! Provides a store wired to an in-memory transport and a staging directory
//! inside a temporary directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use cloudstore_core::CloudStoreConfig;
use cloudstore_transfer::{CloudStore, MemoryTransport};

pub const ZONE: &str = "test-zone";

/// Install a tracing subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A store over a `MemoryTransport` with one zone.
pub struct Harness {
    pub dir: TempDir,
    pub transport: Arc<MemoryTransport>,
    pub store: CloudStore<MemoryTransport>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    pub fn with_config(adjust: impl FnOnce(CloudStoreConfig) -> CloudStoreConfig) -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MemoryTransport::with_zone(ZONE));
        let config = adjust(
            CloudStoreConfig::new(ZONE)
                .with_staging_directory(dir.path().join("staging"))
                .with_progress_interval(Duration::ZERO),
        );
        let store = CloudStore::with_local_fs(Arc::clone(&transport), config);
        Self {
            dir,
            transport,
            store,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.store.config().staging_directory.clone()
    }

    /// True when no staging file is left behind.
    pub fn staging_is_empty(&self) -> bool {
        dir_is_empty(&self.staging_dir())
    }
}

pub fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path).map_or(true, |mut entries| entries.next().is_none())
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
