//! mr-upstream: the upstream side of the streaming proxy.
//!
//! - [`UpstreamClient`]: one backend capable of resolving objects and
//!   fetching byte ranges ([`HttpClient`] for real deployments,
//!   [`MemoryClient`] for tests and demos)
//! - [`ClientPool`]: least-loaded client selection with RAII workload guards
//! - [`ByteStreamer`] and [`AdapterCache`]: one lazily-built streaming
//!   adapter per client, shared across requests
//! - [`ChunkProducer`]: the lazy, ordered chunk sequence for one response
//! - [`StreamService`]: owns the shared state and hands out checkouts

pub mod adapter;
pub mod cache;
pub mod client;
pub mod http;
pub mod memory;
pub mod pool;
pub mod producer;
pub mod service;

pub use adapter::{AdapterSettings, ByteStreamer};
pub use cache::AdapterCache;
pub use client::UpstreamClient;
pub use http::HttpClient;
pub use memory::MemoryClient;
pub use pool::{ClientPool, Selection, WorkloadGuard};
pub use producer::ChunkProducer;
pub use service::{Checkout, StreamService};
