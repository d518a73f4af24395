//! Upstream client speaking a simple HTTP object API.
//!
//! - `GET {base}/containers/{c}/objects/{o}` returns object metadata as JSON
//! - `GET {base}/containers/{c}/objects/{o}/content` with a `Range` header
//!   returns the requested bytes

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mr_core::config::UpstreamClientConfig;
use mr_core::{Error, ObjectMetadata, ObjectRef, Result};
use reqwest::{header, StatusCode};
use serde::Deserialize;

use crate::client::{classify_transport_error, UpstreamClient};

/// Metadata document returned by the upstream API.
#[derive(Debug, Deserialize)]
struct WireMetadata {
    unique_id: String,
    file_size: u64,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

impl From<WireMetadata> for ObjectMetadata {
    fn from(wire: WireMetadata) -> Self {
        Self {
            unique_token: wire.unique_id,
            size_bytes: wire.file_size,
            mime_type: wire.mime_type.filter(|m| !m.is_empty()),
            display_name: wire.file_name.filter(|n| !n.is_empty()),
        }
    }
}

/// [`UpstreamClient`] backed by `reqwest`.
pub struct HttpClient {
    name: String,
    base_url: String,
    api_token: Option<String>,
    chunks_per_second: Option<NonZeroU32>,
    http: reqwest::Client,
}

impl HttpClient {
    /// Build a client from its configuration entry.
    pub fn new(config: &UpstreamClientConfig, timeout: Duration) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(Error::Config(format!(
                "upstream client '{}' has no base_url",
                config.name
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            chunks_per_second: config.chunks_per_second.and_then(NonZeroU32::new),
            http,
        })
    }

    fn object_url(&self, object: ObjectRef) -> String {
        format!(
            "{}/containers/{}/objects/{}",
            self.base_url, object.container_id, object.object_id
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        match classify_transport_error(&err) {
            Some(kind) => Error::PeerDisconnect(kind),
            None => Error::upstream(&self.name, err),
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn chunks_per_second(&self) -> Option<NonZeroU32> {
        self.chunks_per_second
    }

    async fn object_metadata(&self, object: ObjectRef) -> Result<ObjectMetadata> {
        let response = self
            .get(&self.object_url(object))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(Error::ObjectNotFound(object)),
            status if !status.is_success() => {
                return Err(Error::upstream(
                    &self.name,
                    format!("metadata request for {object} returned {status}"),
                ));
            }
            _ => {}
        }

        let wire: WireMetadata = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(wire.into())
    }

    async fn fetch_range(&self, object: ObjectRef, offset: u64, limit: u64) -> Result<Bytes> {
        if limit == 0 {
            return Ok(Bytes::new());
        }

        let url = format!("{}/content", self.object_url(object));
        let end = offset + limit - 1;
        let response = self
            .get(&url)
            .header(header::RANGE, format!("bytes={offset}-{end}"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        match status {
            StatusCode::RANGE_NOT_SATISFIABLE => return Ok(Bytes::new()),
            StatusCode::NOT_FOUND => return Err(Error::ObjectNotFound(object)),
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {}
            _ => {
                return Err(Error::upstream(
                    &self.name,
                    format!("content request for {object} returned {status}"),
                ));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if status == StatusCode::OK {
            // The upstream ignored the Range header and sent everything.
            let len = body.len() as u64;
            let start = offset.min(len) as usize;
            let stop = (offset + limit).min(len) as usize;
            return Ok(body.slice(start..stop));
        }

        Ok(body)
    }
}
