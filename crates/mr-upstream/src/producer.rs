//! Lazy chunk production for one response.
//!
//! A [`ChunkProducer`] walks a [`RangeWindow`] one chunk at a time. Nothing is
//! fetched until the consumer asks for the next item, so a slow reader
//! naturally throttles upstream traffic, and a reader that goes away stops it.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream};
use mr_core::{Error, ObjectRef, RangeWindow, Result};

use crate::adapter::ByteStreamer;
use crate::pool::WorkloadGuard;

/// Pull-based, ordered sequence of trimmed chunks for one range.
pub struct ChunkProducer {
    adapter: Arc<ByteStreamer>,
    object: ObjectRef,
    window: RangeWindow,
    next_index: u64,
    done: bool,
    guard: Option<WorkloadGuard>,
}

impl ChunkProducer {
    pub fn new(adapter: Arc<ByteStreamer>, object: ObjectRef, window: RangeWindow) -> Self {
        Self {
            adapter,
            object,
            window,
            next_index: 0,
            done: window.chunk_count == 0,
            guard: None,
        }
    }

    /// Hold `guard` for as long as this producer is live.
    pub fn with_guard(mut self, guard: WorkloadGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn window(&self) -> &RangeWindow {
        &self.window
    }

    /// Chunks handed out so far.
    pub fn produced(&self) -> u64 {
        self.next_index
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch and trim the next chunk.
    ///
    /// Returns `None` once every chunk has been produced, after the first
    /// error, or after [`cancel`](Self::cancel).
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        if self.done {
            return None;
        }

        let index = self.next_index;
        let offset = self.window.chunk_offset(index);
        let (start, end) = self.window.chunk_bounds(index);

        let result = self
            .adapter
            .fetch_chunk(self.object, offset, self.window.chunk_size)
            .await
            .and_then(|chunk| {
                if (chunk.len() as u64) < end {
                    return Err(Error::upstream(
                        self.adapter.client_name(),
                        format!(
                            "short read for {} at offset {offset}: got {} bytes, needed {end}",
                            self.object,
                            chunk.len()
                        ),
                    ));
                }
                Ok(chunk.slice(start as usize..end as usize))
            });

        self.next_index += 1;
        match &result {
            Ok(bytes) => {
                let client = self.adapter.client_name().to_string();
                metrics::counter!("mediarelay_chunks_fetched_total", "client" => client.clone())
                    .increment(1);
                metrics::counter!("mediarelay_bytes_streamed_total", "client" => client)
                    .increment(bytes.len() as u64);
                if self.next_index >= self.window.chunk_count {
                    self.finish();
                }
            }
            Err(e) => {
                tracing::debug!(object = %self.object, chunk = index, error = %e, "Chunk fetch failed");
                if matches!(e, Error::ObjectNotFound(_)) {
                    // A vanished object must not stay cached.
                    self.adapter.forget(self.object);
                }
                self.finish();
            }
        }

        Some(result)
    }

    /// Stop producing. Later calls to [`next_chunk`](Self::next_chunk)
    /// return `None` without touching the upstream.
    pub fn cancel(&mut self) {
        if !self.done {
            tracing::debug!(
                object = %self.object,
                produced = self.next_index,
                total = self.window.chunk_count,
                "Chunk production cancelled"
            );
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.done = true;
        self.guard = None;
    }

    /// Turn the producer into a `Stream`, suitable for a response body.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
        stream::unfold(self, |mut producer| async move {
            let item = producer.next_chunk().await?;
            Some((item, producer))
        })
    }
}
