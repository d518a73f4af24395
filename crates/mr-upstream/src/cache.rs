//! Process-wide cache of streaming adapters, one per upstream client.
//!
//! Construction is single-flight per client: every slot is a
//! [`tokio::sync::OnceCell`], so concurrent first requests routed to the same
//! client wait on one construction instead of racing to build their own. A
//! failed construction leaves the slot empty and the next request retries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use mr_core::{ClientId, Result};
use tokio::sync::OnceCell;

use crate::adapter::{AdapterSettings, ByteStreamer};
use crate::client::UpstreamClient;

/// Memoizes one [`ByteStreamer`] per [`ClientId`].
pub struct AdapterCache {
    slots: DashMap<ClientId, Arc<OnceCell<Arc<ByteStreamer>>>>,
    settings: AdapterSettings,
    constructed: AtomicUsize,
}

impl AdapterCache {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            slots: DashMap::new(),
            settings,
            constructed: AtomicUsize::new(0),
        }
    }

    /// Return the adapter for `client_id`, building it on first use.
    pub async fn get_or_create(
        &self,
        client_id: ClientId,
        client: &Arc<dyn UpstreamClient>,
    ) -> Result<Arc<ByteStreamer>> {
        // Clone the slot out so no map guard is held across the await.
        let slot = Arc::clone(&self.slots.entry(client_id).or_default());

        let adapter = slot
            .get_or_try_init(|| async {
                tracing::debug!(client = %client_id, "Creating new stream adapter");
                let adapter = ByteStreamer::connect(client_id, Arc::clone(client), self.settings)?;
                self.constructed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, mr_core::Error>(Arc::new(adapter))
            })
            .await?;

        Ok(Arc::clone(adapter))
    }

    /// The adapter for `client_id` if it has been built.
    pub fn get(&self, client_id: ClientId) -> Option<Arc<ByteStreamer>> {
        self.slots
            .get(&client_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Number of adapters built over the cache's lifetime.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    /// Number of clients that currently have an adapter.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AdapterCache {
    fn default() -> Self {
        Self::new(AdapterSettings::default())
    }
}
