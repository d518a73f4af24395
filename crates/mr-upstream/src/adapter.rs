//! Per-client streaming adapter.
//!
//! A [`ByteStreamer`] wraps one upstream client with the state that makes it
//! worth sharing: a short-lived metadata cache (so repeated range requests
//! for the same object do not re-resolve it) with its background cleanup
//! task, and an optional rate limiter enforcing the client's throughput
//! budget. Exactly one exists per client; see [`crate::AdapterCache`].

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use mr_core::{ClientId, Error, ObjectMetadata, ObjectRef, Result};
use tokio_util::sync::CancellationToken;

use crate::client::UpstreamClient;

/// Tunables shared by every adapter.
#[derive(Debug, Clone, Copy)]
pub struct AdapterSettings {
    /// How long a resolved metadata entry may be reused.
    pub metadata_ttl: Duration,
    /// How often expired metadata entries are swept.
    pub cleanup_interval: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        // Default: 30 minute TTL, swept every 30 minutes
        Self {
            metadata_ttl: Duration::from_secs(1800),
            cleanup_interval: Duration::from_secs(1800),
        }
    }
}

struct CachedMetadata {
    metadata: ObjectMetadata,
    fetched_at: Instant,
}

/// Streaming adapter for one upstream client.
pub struct ByteStreamer {
    client_id: ClientId,
    client: Arc<dyn UpstreamClient>,
    metadata: Arc<DashMap<ObjectRef, CachedMetadata>>,
    metadata_ttl: Duration,
    limiter: Option<DefaultDirectRateLimiter>,
    cleanup: CancellationToken,
}

impl ByteStreamer {
    /// Build the adapter and start its metadata cleanup task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        client_id: ClientId,
        client: Arc<dyn UpstreamClient>,
        settings: AdapterSettings,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("adapter needs a tokio runtime: {e}")))?;

        let metadata = Arc::new(DashMap::new());
        let cleanup = CancellationToken::new();
        runtime.spawn(run_cleanup(
            Arc::clone(&metadata),
            settings,
            cleanup.clone(),
        ));

        let limiter = client
            .chunks_per_second()
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        tracing::debug!(client = %client_id, name = client.name(), "Created stream adapter");

        Ok(Self {
            client_id,
            client,
            metadata,
            metadata_ttl: settings.metadata_ttl,
            limiter,
            cleanup,
        })
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Throughput budget this adapter enforces, if any.
    pub fn rate_limit(&self) -> Option<NonZeroU32> {
        self.client.chunks_per_second()
    }

    /// Number of metadata entries currently cached.
    pub fn cached_objects(&self) -> usize {
        self.metadata.len()
    }

    /// Resolve an object's metadata, reusing a fresh cached entry if present.
    pub async fn object_metadata(&self, object: ObjectRef) -> Result<ObjectMetadata> {
        if let Some(entry) = self.metadata.get(&object) {
            if entry.fetched_at.elapsed() < self.metadata_ttl {
                return Ok(entry.metadata.clone());
            }
        }

        match self.client.object_metadata(object).await {
            Ok(metadata) => {
                self.metadata.insert(
                    object,
                    CachedMetadata {
                        metadata: metadata.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(metadata)
            }
            Err(e) => {
                if matches!(e, Error::ObjectNotFound(_)) {
                    self.metadata.remove(&object);
                }
                Err(e)
            }
        }
    }

    /// Fetch one chunk, waiting for the rate limiter first.
    pub async fn fetch_chunk(&self, object: ObjectRef, offset: u64, limit: u64) -> Result<Bytes> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        self.client.fetch_range(object, offset, limit).await
    }

    /// Drop a cached metadata entry.
    pub fn forget(&self, object: ObjectRef) {
        self.metadata.remove(&object);
    }

    /// Remove expired metadata entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        sweep(&self.metadata, self.metadata_ttl)
    }
}

impl Drop for ByteStreamer {
    fn drop(&mut self) {
        self.cleanup.cancel();
    }
}

fn sweep(metadata: &DashMap<ObjectRef, CachedMetadata>, ttl: Duration) -> usize {
    let before = metadata.len();
    metadata.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
    before.saturating_sub(metadata.len())
}

async fn run_cleanup(
    metadata: Arc<DashMap<ObjectRef, CachedMetadata>>,
    settings: AdapterSettings,
    cancel: CancellationToken,
) {
    let period = settings.cleanup_interval.max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let removed = sweep(&metadata, settings.metadata_ttl);
                if removed > 0 {
                    tracing::debug!(removed, "Cleaned up cached object metadata");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;

    fn setup(ttl: Duration) -> (Arc<MemoryClient>, ByteStreamer, ObjectRef) {
        let client = Arc::new(MemoryClient::new("mem"));
        let obj = ObjectRef::new(-100, 1);
        client.insert(
            obj,
            ObjectMetadata {
                unique_token: "AgADtoken".into(),
                size_bytes: 0,
                mime_type: Some("video/mp4".into()),
                display_name: None,
            },
            vec![1u8; 64],
        );
        let settings = AdapterSettings {
            metadata_ttl: ttl,
            cleanup_interval: Duration::from_secs(3600),
        };
        let adapter = ByteStreamer::connect(ClientId::new(0), client.clone(), settings).unwrap();
        (client, adapter, obj)
    }

    #[test]
    fn connect_outside_runtime_fails() {
        let client: Arc<dyn UpstreamClient> = Arc::new(MemoryClient::new("mem"));
        let result = ByteStreamer::connect(ClientId::new(0), client, AdapterSettings::default());
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn metadata_is_cached() {
        let (client, adapter, obj) = setup(Duration::from_secs(60));
        let first = adapter.object_metadata(obj).await.unwrap();
        let second = adapter.object_metadata(obj).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.metadata_calls(), 1);
        assert_eq!(adapter.cached_objects(), 1);
    }

    #[tokio::test]
    async fn expired_metadata_is_refetched() {
        let (client, adapter, obj) = setup(Duration::ZERO);
        adapter.object_metadata(obj).await.unwrap();
        adapter.object_metadata(obj).await.unwrap();
        assert_eq!(client.metadata_calls(), 2);
        assert_eq!(adapter.cleanup_expired(), 1);
        assert_eq!(adapter.cached_objects(), 0);
    }

    #[tokio::test]
    async fn not_found_evicts_cached_entry() {
        let (client, adapter, obj) = setup(Duration::ZERO);
        adapter.object_metadata(obj).await.unwrap();
        client.remove(obj);
        assert!(matches!(
            adapter.object_metadata(obj).await,
            Err(Error::ObjectNotFound(_))
        ));
        assert_eq!(adapter.cached_objects(), 0);
    }

    #[tokio::test]
    async fn forget_drops_entry() {
        let (_client, adapter, obj) = setup(Duration::from_secs(60));
        adapter.object_metadata(obj).await.unwrap();
        adapter.forget(obj);
        assert_eq!(adapter.cached_objects(), 0);
    }

    #[tokio::test]
    async fn fetch_chunk_reaches_client() {
        let (client, adapter, obj) = setup(Duration::from_secs(60));
        let chunk = adapter.fetch_chunk(obj, 0, 16).await.unwrap();
        assert_eq!(chunk.len(), 16);
        assert_eq!(client.fetch_calls(), 1);
        assert_eq!(adapter.client_name(), "mem");
        assert!(adapter.rate_limit().is_none());
    }
}
