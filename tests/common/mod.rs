//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] over
//! in-memory upstream clients and an in-memory catalog. The
//! [`TestHarness::with_server`] constructor starts axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use mr_core::config::Config;
use mr_core::{ObjectMetadata, ObjectRef};
use mr_db::pool::{init_memory_pool, DbPool};
use mr_db::queries::catalog::{upsert_file, NewCatalogFile};
use mr_server::catalog::SqliteCatalog;
use mr_server::context::AppContext;
use mr_server::router::build_router;
use mr_upstream::{AdapterSettings, MemoryClient, StreamService, UpstreamClient};

/// Chunk size used by the harness: small enough that modest objects span
/// several chunks.
pub const CHUNK: u64 = 1024;

/// Unique token every fixture object carries.
pub const TOKEN: &str = "AgADBAADpq9xyz";

/// The `hash` query value matching [`TOKEN`].
pub const HASH: &str = "AgADBA";

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub clients: Vec<Arc<MemoryClient>>,
    pub db: DbPool,
}

impl TestHarness {
    /// Harness with one upstream client.
    pub fn new() -> Self {
        Self::with_clients(1)
    }

    /// Harness with `n` upstream clients, in pool order.
    pub fn with_clients(n: usize) -> Self {
        let clients: Vec<Arc<MemoryClient>> = (0..n)
            .map(|i| Arc::new(MemoryClient::new(format!("client-{i}"))))
            .collect();
        let upstream: Vec<Arc<dyn UpstreamClient>> = clients
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn UpstreamClient>)
            .collect();

        let streams = StreamService::new(upstream, AdapterSettings::default(), CHUNK)
            .expect("failed to build stream service");
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let catalog = Arc::new(SqliteCatalog::new(db.clone()));

        let ctx = AppContext::new(Config::default(), streams, catalog);
        Self { ctx, clients, db }
    }

    /// Start an axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Start a server for an existing harness.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = build_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            mr_server::serve(listener, app, std::future::pending()).await.ok();
        });

        (self, addr)
    }

    /// Store `data` as object `(container, id)` on every client and publish
    /// it in the catalog.
    pub fn insert_object(
        &self,
        container: i64,
        id: i64,
        data: Vec<u8>,
        mime_type: Option<&str>,
        display_name: Option<&str>,
    ) -> ObjectRef {
        let object = ObjectRef::new(container, id);
        let metadata = ObjectMetadata {
            unique_token: TOKEN.into(),
            size_bytes: 0,
            mime_type: mime_type.map(String::from),
            display_name: display_name.map(String::from),
        };
        for client in &self.clients {
            client.insert(object, metadata.clone(), data.clone());
        }

        let conn = self.conn();
        upsert_file(
            &conn,
            object,
            &NewCatalogFile {
                hash: TOKEN,
                file_name: display_name,
                mime_type,
                file_size: data.len() as u64,
            },
        )
        .expect("failed to publish object");

        object
    }

    /// Remove an object from every client, as if deleted upstream.
    pub fn remove_object(&self, object: ObjectRef) {
        for client in &self.clients {
            client.remove(object);
        }
    }

    /// Total range fetches across all clients.
    pub fn fetch_calls(&self) -> usize {
        self.clients.iter().map(|c| c.fetch_calls()).sum()
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> mr_db::pool::PooledConnection {
        mr_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }
}

/// Deterministic fixture bytes.
pub fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

/// Stream URL for `object` with the given hash.
pub fn stream_url(addr: SocketAddr, object: ObjectRef, hash: &str) -> String {
    format!(
        "http://{addr}/{}/video.mp4?id={}&hash={hash}",
        object.container_id, object.object_id
    )
}
