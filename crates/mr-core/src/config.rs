//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! sub-configs for the HTTP server, the upstream client pool, streaming, and
//! the catalog. Every section defaults sensibly so a completely empty `{}`
//! file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::range::DEFAULT_CHUNK_SIZE;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub streaming: StreamingConfig,
    pub catalog: CatalogConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.upstream.clients.is_empty() {
            warnings.push("upstream.clients is empty; every stream request will fail".into());
        }

        for (i, client) in self.upstream.clients.iter().enumerate() {
            if client.base_url.is_empty() {
                warnings.push(format!("upstream.clients[{i}].base_url is empty"));
            }
            if client.chunks_per_second == Some(0) {
                warnings.push(format!(
                    "upstream.clients[{i}].chunks_per_second is 0; rate limiting disabled"
                ));
            }
        }

        if self.streaming.chunk_size == 0 {
            warnings.push(format!(
                "streaming.chunk_size is 0; falling back to {DEFAULT_CHUNK_SIZE}"
            ));
        }

        if self.streaming.token_length == 0 {
            warnings.push(
                "streaming.token_length is 0; only an empty hash will be accepted".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// The pool of upstream API clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub clients: Vec<UpstreamClientConfig>,
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            clients: Vec::new(),
            request_timeout_secs: 30,
        }
    }
}

/// One upstream API client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamClientConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Throughput budget for chunk fetches. `None` means unlimited.
    #[serde(default)]
    pub chunks_per_second: Option<u32>,
}

/// Streaming behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub chunk_size: u64,
    /// Number of leading unique-token characters the `hash` query must match.
    pub token_length: usize,
    pub metadata_cache_ttl_secs: u64,
    pub metadata_cleanup_interval_secs: u64,
}

impl StreamingConfig {
    /// Chunk size with the zero value mapped to the default.
    pub fn effective_chunk_size(&self) -> u64 {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            token_length: 6,
            metadata_cache_ttl_secs: 1800,
            metadata_cleanup_interval_secs: 1800,
        }
    }
}

/// Local catalog of known objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite file. `None` disables the catalog.
    pub db_path: Option<PathBuf>,
}
