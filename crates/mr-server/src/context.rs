//! Application context shared across route handlers via axum state.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use mr_core::config::Config;
use mr_upstream::StreamService;

use crate::catalog::Catalog;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Client pool and adapter cache.
    pub streams: Arc<StreamService>,
    pub catalog: Arc<dyn Catalog>,
    /// `None` when no recorder could be installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppContext {
    pub fn new(config: Config, streams: StreamService, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            config: Arc::new(config),
            streams: Arc::new(streams),
            catalog,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    /// Number of leading token characters the `hash` query must carry.
    pub fn token_length(&self) -> usize {
        self.config.streaming.token_length
    }
}
