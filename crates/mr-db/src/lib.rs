//! mr-db: the local object catalog.
//!
//! SQLite-backed storage with connection pooling and embedded migrations.
//! The catalog remembers objects that have been published for streaming and
//! forgets them once the upstream reports them gone.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use models::CatalogFile;
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
