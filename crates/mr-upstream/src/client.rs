//! The upstream client abstraction.

use std::num::NonZeroU32;

use async_trait::async_trait;
use bytes::Bytes;
use mr_core::{DisconnectKind, ObjectMetadata, ObjectRef, Result};

/// A backend able to resolve object metadata and fetch byte ranges.
///
/// Implementations must be cheap to share: the pool hands the same client to
/// many concurrent requests.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Human-readable name, used in logs and metric labels.
    fn name(&self) -> &str;

    /// Throughput budget for chunk fetches, if the backend has one.
    fn chunks_per_second(&self) -> Option<NonZeroU32> {
        None
    }

    /// Resolve an object's metadata.
    ///
    /// Fails with [`mr_core::Error::ObjectNotFound`] when the object no
    /// longer exists.
    async fn object_metadata(&self, object: ObjectRef) -> Result<ObjectMetadata>;

    /// Fetch up to `limit` bytes of `object` starting at `offset`.
    ///
    /// May return fewer bytes when the range runs past the end of the
    /// object, and an empty buffer when `offset` is at or past the end.
    async fn fetch_range(&self, object: ObjectRef, offset: u64, limit: u64) -> Result<Bytes>;
}

/// Classify a transport error by walking its source chain.
///
/// Returns the disconnect class when the failure is one of the expected
/// "peer went away" kinds, `None` otherwise.
pub fn classify_transport_error(
    err: &(dyn std::error::Error + 'static),
) -> Option<DisconnectKind> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe => return Some(DisconnectKind::ConnectionReset),
                std::io::ErrorKind::UnexpectedEof => return Some(DisconnectKind::HalfClosed),
                _ => {}
            }
        }
        if let Some(h) = e.downcast_ref::<hyper::Error>() {
            if h.is_parse() {
                return Some(DisconnectKind::MalformedStatusLine);
            }
            if h.is_incomplete_message() {
                return Some(DisconnectKind::HalfClosed);
            }
        }
        current = e.source();
    }
    None
}
