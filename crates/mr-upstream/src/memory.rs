//! In-memory upstream client.
//!
//! Holds objects in a map and counts every call, which makes it the backend
//! of choice for tests that need to observe how often the upstream is hit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use mr_core::{Error, ObjectMetadata, ObjectRef, Result};
use parking_lot::RwLock;

use crate::client::UpstreamClient;

struct StoredObject {
    metadata: ObjectMetadata,
    data: Bytes,
}

/// [`UpstreamClient`] serving objects from memory.
pub struct MemoryClient {
    name: String,
    objects: RwLock<HashMap<ObjectRef, StoredObject>>,
    metadata_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MemoryClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(HashMap::new()),
            metadata_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Store an object. `metadata.size_bytes` is overwritten with the data length.
    pub fn insert(&self, object: ObjectRef, mut metadata: ObjectMetadata, data: impl Into<Bytes>) {
        let data = data.into();
        metadata.size_bytes = data.len() as u64;
        self.objects
            .write()
            .insert(object, StoredObject { metadata, data });
    }

    /// Remove an object, as if it had been deleted upstream.
    pub fn remove(&self, object: ObjectRef) -> bool {
        self.objects.write().remove(&object).is_some()
    }

    /// Number of metadata lookups served so far.
    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    /// Number of range fetches served so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for MemoryClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn object_metadata(&self, object: ObjectRef) -> Result<ObjectMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .read()
            .get(&object)
            .map(|stored| stored.metadata.clone())
            .ok_or(Error::ObjectNotFound(object))
    }

    async fn fetch_range(&self, object: ObjectRef, offset: u64, limit: u64) -> Result<Bytes> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.read();
        let stored = objects.get(&object).ok_or(Error::ObjectNotFound(object))?;

        let len = stored.data.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(limit).min(len) as usize;
        Ok(stored.data.slice(start..end))
    }
}
