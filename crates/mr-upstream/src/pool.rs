//! Upstream client pool with live workload tracking.
//!
//! Each client carries a counter of in-flight streams. [`ClientPool::select`]
//! picks the least-loaded client and returns a [`WorkloadGuard`] that counts
//! the caller's stream against it until the guard is dropped. The guard is
//! moved into the response body, so the count covers the whole life of the
//! stream: it is released when the body finishes, fails, or is dropped after
//! a client disconnect.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mr_core::{ClientId, Error, Result};
use parking_lot::Mutex;

use crate::client::UpstreamClient;

struct PoolEntry {
    client: Arc<dyn UpstreamClient>,
    workload: Arc<AtomicUsize>,
}

/// The set of configured upstream clients and their workloads.
pub struct ClientPool {
    entries: Vec<PoolEntry>,
    /// Serializes pick-then-increment so two concurrent selections see each
    /// other's increments.
    select_lock: Mutex<()>,
}

/// A client picked for one request, with its workload already counted.
pub struct Selection {
    pub client_id: ClientId,
    pub client: Arc<dyn UpstreamClient>,
    pub guard: WorkloadGuard,
}

impl ClientPool {
    /// Build a pool. Pool order is the tie-break order for selection.
    pub fn new(clients: Vec<Arc<dyn UpstreamClient>>) -> Result<Self> {
        if clients.is_empty() {
            return Err(Error::Config("at least one upstream client is required".into()));
        }

        let entries = clients
            .into_iter()
            .map(|client| PoolEntry {
                client,
                workload: Arc::new(AtomicUsize::new(0)),
            })
            .collect();

        Ok(Self {
            entries,
            select_lock: Mutex::new(()),
        })
    }

    /// Number of clients in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The client at `id`, if any.
    pub fn client(&self, id: ClientId) -> Option<&Arc<dyn UpstreamClient>> {
        self.entries.get(id.get()).map(|e| &e.client)
    }

    /// Current workload of one client.
    pub fn workload(&self, id: ClientId) -> usize {
        self.entries
            .get(id.get())
            .map(|e| e.workload.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Snapshot of every client's workload, in pool order.
    pub fn workloads(&self) -> Vec<(ClientId, usize)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (ClientId::new(i), e.workload.load(Ordering::SeqCst)))
            .collect()
    }

    /// The client with the lowest workload right now; the first one in pool
    /// order wins ties. Reads the counters without changing them.
    pub fn least_loaded(&self) -> ClientId {
        let index = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.workload.load(Ordering::SeqCst))
            .map(|(i, _)| i)
            .unwrap_or(0);
        ClientId::new(index)
    }

    /// Pick the least-loaded client and count one stream against it.
    pub fn select(&self) -> Selection {
        let _lock = self.select_lock.lock();
        let client_id = self.least_loaded();
        let entry = &self.entries[client_id.get()];
        let guard = WorkloadGuard::acquire(
            client_id,
            entry.client.name().to_string(),
            Arc::clone(&entry.workload),
        );

        Selection {
            client_id,
            client: Arc::clone(&entry.client),
            guard,
        }
    }
}

/// Counts one in-flight stream against a client until dropped.
pub struct WorkloadGuard {
    client_id: ClientId,
    client_name: String,
    counter: Arc<AtomicUsize>,
}

impl WorkloadGuard {
    fn acquire(client_id: ClientId, client_name: String, counter: Arc<AtomicUsize>) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("mediarelay_upstream_workload", "client" => client_name.clone())
            .set(now as f64);
        Self {
            client_id,
            client_name,
            counter,
        }
    }

    /// The client this guard counts against.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }
}

impl Drop for WorkloadGuard {
    fn drop(&mut self) {
        let now = self.counter.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("mediarelay_upstream_workload", "client" => self.client_name.clone())
            .set(now as f64);
        tracing::trace!(client = %self.client_id, workload = now, "Released stream slot");
    }
}

impl std::fmt::Debug for WorkloadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadGuard")
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .finish()
    }
}
