//! Shared streaming state: the client pool plus the adapter cache.

use std::sync::Arc;
use std::time::Duration;

use mr_core::config::Config;
use mr_core::{ClientId, ObjectRef, RangeWindow, Result};

use crate::adapter::{AdapterSettings, ByteStreamer};
use crate::cache::AdapterCache;
use crate::client::UpstreamClient;
use crate::http::HttpClient;
use crate::pool::{ClientPool, WorkloadGuard};
use crate::producer::ChunkProducer;

/// Entry point for the request path.
pub struct StreamService {
    pool: ClientPool,
    adapters: AdapterCache,
    chunk_size: u64,
}

/// A client picked for one request, with its adapter ready and its workload
/// counted until the guard is dropped.
pub struct Checkout {
    pub client_id: ClientId,
    pub adapter: Arc<ByteStreamer>,
    pub guard: WorkloadGuard,
}

impl Checkout {
    /// Start producing `window` of `object`. The producer takes over the
    /// workload guard.
    pub fn into_producer(self, object: ObjectRef, window: RangeWindow) -> ChunkProducer {
        ChunkProducer::new(self.adapter, object, window).with_guard(self.guard)
    }
}

impl StreamService {
    pub fn new(
        clients: Vec<Arc<dyn UpstreamClient>>,
        settings: AdapterSettings,
        chunk_size: u64,
    ) -> Result<Self> {
        Ok(Self {
            pool: ClientPool::new(clients)?,
            adapters: AdapterCache::new(settings),
            chunk_size,
        })
    }

    /// Build HTTP clients for every configured upstream.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.upstream.request_timeout_secs);
        let clients = config
            .upstream
            .clients
            .iter()
            .map(|c| HttpClient::new(c, timeout).map(|client| Arc::new(client) as Arc<dyn UpstreamClient>))
            .collect::<Result<Vec<_>>>()?;

        let settings = AdapterSettings {
            metadata_ttl: Duration::from_secs(config.streaming.metadata_cache_ttl_secs),
            cleanup_interval: Duration::from_secs(config.streaming.metadata_cleanup_interval_secs),
        };

        tracing::info!(clients = clients.len(), "Initialized upstream client pool");
        Self::new(clients, settings, config.streaming.effective_chunk_size())
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    pub fn adapters(&self) -> &AdapterCache {
        &self.adapters
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Pick the least-loaded client and get its adapter.
    ///
    /// The workload is counted from selection onwards; if the adapter cannot
    /// be built the guard is dropped here and the count released.
    pub async fn checkout(&self) -> Result<Checkout> {
        let selection = self.pool.select();
        let adapter = self
            .adapters
            .get_or_create(selection.client_id, &selection.client)
            .await?;

        Ok(Checkout {
            client_id: selection.client_id,
            adapter,
            guard: selection.guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;
    use mr_core::config::UpstreamClientConfig;
    use mr_core::{plan, Error};

    fn service(n: usize) -> StreamService {
        let clients = (0..n)
            .map(|i| Arc::new(MemoryClient::new(format!("m{i}"))) as Arc<dyn UpstreamClient>)
            .collect();
        StreamService::new(clients, AdapterSettings::default(), 1024).unwrap()
    }

    #[tokio::test]
    async fn checkout_spreads_and_reuses_adapters() {
        let service = service(2);
        let a = service.checkout().await.unwrap();
        let b = service.checkout().await.unwrap();
        assert_eq!(a.client_id, ClientId::new(0));
        assert_eq!(b.client_id, ClientId::new(1));
        drop((a, b));

        let c = service.checkout().await.unwrap();
        assert_eq!(c.client_id, ClientId::new(0));
        assert_eq!(service.adapters().constructed(), 2);
        assert_eq!(service.pool().workload(ClientId::new(0)), 1);
    }

    #[tokio::test]
    async fn producer_owns_the_guard() {
        let service = service(1);
        let checkout = service.checkout().await.unwrap();
        let window = plan(0, 9, 10, service.chunk_size()).unwrap();
        let producer = checkout.into_producer(ObjectRef::new(1, 1), window);
        assert_eq!(service.pool().workload(ClientId::new(0)), 1);
        drop(producer);
        assert_eq!(service.pool().workload(ClientId::new(0)), 0);
    }

    #[test]
    fn from_config_requires_clients() {
        let config = Config::default();
        assert!(matches!(StreamService::from_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn from_config_builds_http_clients() {
        let mut config = Config::default();
        config.upstream.clients.push(UpstreamClientConfig {
            name: "primary".into(),
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        });
        let service = StreamService::from_config(&config).unwrap();
        assert_eq!(service.pool().len(), 1);
        assert_eq!(service.chunk_size(), mr_core::DEFAULT_CHUNK_SIZE);
    }
}
