//! In-memory object transport.
//!
//! Stands in for a vendor SDK in tests. Objects live in per-zone maps, bodies
//! are streamed in fixed-size chunks with an optional delay per chunk, and
//! failures can be injected per identifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use cloudstore_core::ports::{ObjectTransport, RemoteObject, TransportError};
use cloudstore_core::transfer::RecordId;

#[derive(Debug, Default)]
struct State {
    zones: HashMap<String, HashMap<RecordId, Vec<u8>>>,
    failures: HashMap<RecordId, TransportError>,
}

/// `ObjectTransport` holding objects in memory.
#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<State>,
    authenticated: AtomicBool,
    report_size: AtomicBool,
    chunk_size: AtomicUsize,
    chunk_delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create a signed-in transport with no zones.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            authenticated: AtomicBool::new(true),
            report_size: AtomicBool::new(true),
            chunk_size: AtomicUsize::new(64 * 1024),
            chunk_delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a transport with one existing zone.
    pub fn with_zone(zone: &str) -> Self {
        let transport = Self::new();
        transport.create_zone(zone);
        transport
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delay(&self) -> Duration {
        *self
            .chunk_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty zone.
    pub fn create_zone(&self, zone: &str) {
        self.state().zones.entry(zone.to_string()).or_default();
    }

    /// Sign in or out.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// Whether `fetch` reports the object size up front.
    pub fn set_report_size(&self, report: bool) {
        self.report_size.store(report, Ordering::SeqCst);
    }

    /// Size of streamed chunks.
    pub fn set_chunk_size(&self, size: usize) {
        self.chunk_size.store(size.max(1), Ordering::SeqCst);
    }

    /// Delay applied before each chunk, to keep transfers in flight.
    pub fn set_chunk_delay(&self, delay: Duration) {
        *self
            .chunk_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Make the next operation on `id` fail with `error`.
    pub fn fail_next(&self, id: RecordId, error: TransportError) {
        self.state().failures.insert(id, error);
    }

    /// Store an object directly.
    pub fn insert(&self, zone: &str, id: RecordId, body: impl Into<Vec<u8>>) {
        self.state()
            .zones
            .entry(zone.to_string())
            .or_default()
            .insert(id, body.into());
    }

    /// Stored body of an object.
    pub fn get(&self, zone: &str, id: RecordId) -> Option<Vec<u8>> {
        self.state()
            .zones
            .get(zone)
            .and_then(|objects| objects.get(&id).cloned())
    }

    /// Whether an object is stored under `id`.
    pub fn contains(&self, zone: &str, id: RecordId) -> bool {
        self.get(zone, id).is_some()
    }

    /// Number of objects in `zone`.
    pub fn object_count(&self, zone: &str) -> usize {
        self.state().zones.get(zone).map_or(0, HashMap::len)
    }

    /// Number of `fetch`/`store`/`delete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self, zone: &str, id: RecordId) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.authenticated.load(Ordering::SeqCst) {
            return Err(TransportError::NotAuthenticated);
        }

        let mut state = self.state();
        if let Some(error) = state.failures.remove(&id) {
            return Err(error);
        }
        if !state.zones.contains_key(zone) {
            return Err(TransportError::ZoneNotFound {
                zone: zone.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectTransport for MemoryTransport {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn fetch(&self, zone: &str, id: RecordId) -> Result<RemoteObject, TransportError> {
        self.begin(zone, id)?;
        let body = self.get(zone, id).ok_or(TransportError::NotFound)?;

        let size = self
            .report_size
            .load(Ordering::SeqCst)
            .then_some(body.len() as u64);
        let chunk_size = self.chunk_size.load(Ordering::SeqCst);
        let delay = self.delay();

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for chunk in body.chunks(chunk_size) {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(chunk.to_vec())).await.is_err() {
                    tracing::debug!(id = %id, "Fetch abandoned by receiver");
                    return;
                }
            }
        });

        Ok(RemoteObject { size, chunks: rx })
    }

    async fn store(
        &self,
        zone: &str,
        id: RecordId,
        body: Vec<u8>,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<(), TransportError> {
        self.begin(zone, id)?;
        let chunk_size = self.chunk_size.load(Ordering::SeqCst);
        let delay = self.delay();

        let mut acknowledged = 0u64;
        for chunk in body.chunks(chunk_size) {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            acknowledged += chunk.len() as u64;
            progress(acknowledged);
        }

        // Only a fully received body becomes visible.
        self.insert(zone, id, body);
        Ok(())
    }

    async fn delete(&self, zone: &str, id: RecordId) -> Result<(), TransportError> {
        self.begin(zone, id)?;
        let removed = self
            .state()
            .zones
            .get_mut(zone)
            .and_then(|objects| objects.remove(&id));
        removed.map(|_| ()).ok_or(TransportError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_streams_stored_body() {
        let transport = MemoryTransport::with_zone("z");
        transport.set_chunk_size(3);
        let id = RecordId::new();
        transport.insert("z", id, b"abcdefgh".to_vec());

        let mut object = transport.fetch("z", id).await.unwrap();
        assert_eq!(object.size, Some(8));

        let mut body = Vec::new();
        while let Some(chunk) = object.chunks.recv().await {
            body.extend(chunk.unwrap());
        }
        assert_eq!(body, b"abcdefgh");
    }

    #[tokio::test]
    async fn test_missing_zone_and_object() {
        let transport = MemoryTransport::with_zone("z");
        let id = RecordId::new();

        assert_eq!(
            transport.fetch("other", id).await.unwrap_err(),
            TransportError::ZoneNotFound {
                zone: "other".to_string()
            }
        );
        assert_eq!(
            transport.delete("z", id).await.unwrap_err(),
            TransportError::NotFound
        );
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let transport = MemoryTransport::with_zone("z");
        let id = RecordId::new();
        transport.fail_next(id, TransportError::ServiceUnavailable);

        let noop = |_: u64| {};
        assert_eq!(
            transport.store("z", id, vec![1], &noop).await,
            Err(TransportError::ServiceUnavailable)
        );
        assert_eq!(transport.store("z", id, vec![1], &noop).await, Ok(()));
        assert!(transport.contains("z", id));
    }
}
