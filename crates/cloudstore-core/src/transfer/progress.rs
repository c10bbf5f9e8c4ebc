//! Progress snapshots.

use serde::{Deserialize, Serialize};

/// Snapshot of a download in flight.
///
/// The remote size may be unknown until the backend reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub completed_bytes: u64,
    /// Total bytes to receive, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Create a new snapshot.
    pub const fn new(completed_bytes: u64, total_bytes: Option<u64>) -> Self {
        Self {
            completed_bytes,
            total_bytes,
        }
    }

    /// Fraction of the transfer completed, absent when the total is unknown.
    ///
    /// A known total of zero reports `1.0`.
    pub fn fraction_completed(&self) -> Option<f64> {
        self.total_bytes
            .map(|total| fraction(self.completed_bytes, total))
    }

    /// True once every expected byte has arrived.
    pub fn is_complete(&self) -> bool {
        self.total_bytes
            .is_some_and(|total| self.completed_bytes >= total)
    }
}

/// Snapshot of an upload in flight.
///
/// The payload length is known locally, so the total is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes acknowledged so far.
    pub completed_bytes: u64,
    /// Total bytes to send.
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Create a new snapshot.
    pub const fn new(completed_bytes: u64, total_bytes: u64) -> Self {
        Self {
            completed_bytes,
            total_bytes,
        }
    }

    /// Fraction of the transfer completed.
    pub fn fraction_completed(&self) -> f64 {
        fraction(self.completed_bytes, self.total_bytes)
    }

    /// True once every byte has been acknowledged.
    pub const fn is_complete(&self) -> bool {
        self.completed_bytes >= self.total_bytes
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(completed: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        completed as f64 / total as f64
    }
}
