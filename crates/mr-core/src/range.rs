//! Byte-range planning.
//!
//! Translates an HTTP byte range into a window of fixed-size, aligned chunk
//! fetches plus the trim offsets needed to cut the first and last chunk down
//! to the exact requested bytes. Everything here is pure arithmetic.

use serde::Serialize;

use crate::error::{Error, Result};

/// Upstream chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// A planned, validated byte window over one object.
///
/// All offsets are inclusive byte positions within the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeWindow {
    /// First byte to send.
    pub from_bytes: u64,
    /// Last byte to send.
    pub until_bytes: u64,
    /// Size of the whole object.
    pub total_size: u64,
    /// Size of each upstream fetch.
    pub chunk_size: u64,
    /// `from_bytes` rounded down to a chunk boundary; where fetching starts.
    pub aligned_offset: u64,
    /// Bytes to drop from the front of the first chunk.
    pub first_chunk_trim: u64,
    /// Bytes to keep from the front of the last chunk.
    pub last_chunk_keep: u64,
    /// Number of chunks to fetch.
    pub chunk_count: u64,
}

impl RangeWindow {
    /// Window covering the whole object.
    pub fn whole(total_size: u64, chunk_size: u64) -> Result<Self> {
        let until = total_size
            .checked_sub(1)
            .ok_or(Error::RangeNotSatisfiable { total_size })?;
        plan(0, until, total_size, chunk_size)
    }

    /// Number of bytes the response body carries.
    pub fn response_length(&self) -> u64 {
        self.until_bytes - self.from_bytes + 1
    }

    /// Value for the `Content-Range` header.
    pub fn content_range(&self) -> String {
        format!(
            "bytes {}-{}/{}",
            self.from_bytes, self.until_bytes, self.total_size
        )
    }

    /// Whether chunk `index` is the first of the window.
    pub fn is_first(&self, index: u64) -> bool {
        index == 0
    }

    /// Whether chunk `index` is the last of the window.
    pub fn is_last(&self, index: u64) -> bool {
        index + 1 == self.chunk_count
    }

    /// Upstream offset of chunk `index`.
    pub fn chunk_offset(&self, index: u64) -> u64 {
        self.aligned_offset + index * self.chunk_size
    }

    /// The `start..end` slice of chunk `index` that belongs to the response.
    pub fn chunk_bounds(&self, index: u64) -> (u64, u64) {
        let start = if self.is_first(index) {
            self.first_chunk_trim
        } else {
            0
        };
        let end = if self.is_last(index) {
            self.last_chunk_keep
        } else {
            self.chunk_size
        };
        (start, end)
    }
}

/// Plan the chunk window for the inclusive range `from..=until`.
///
/// Fails with [`Error::RangeNotSatisfiable`] when the range does not lie
/// within an object of `total_size` bytes.
pub fn plan(from: u64, until: u64, total_size: u64, chunk_size: u64) -> Result<RangeWindow> {
    if chunk_size == 0 {
        return Err(Error::Validation("chunk size must be non-zero".into()));
    }
    if total_size == 0 || until >= total_size || until < from {
        return Err(Error::RangeNotSatisfiable { total_size });
    }

    let aligned_offset = from - (from % chunk_size);
    let first_chunk_trim = from - aligned_offset;
    let last_chunk_keep = (until % chunk_size) + 1;
    // Index of the chunk holding `until`, minus the index of the first
    // chunk, plus one. Stays correct when `until` sits on a chunk boundary.
    let chunk_count = until / chunk_size - aligned_offset / chunk_size + 1;

    Ok(RangeWindow {
        from_bytes: from,
        until_bytes: until,
        total_size,
        chunk_size,
        aligned_offset,
        first_chunk_trim,
        last_chunk_keep,
        chunk_count,
    })
}

/// A single byte range as sent in a `Range` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=START-END`
    Bounded { start: u64, end: u64 },
    /// `bytes=START-`
    From(u64),
    /// `bytes=-LEN`, the last LEN bytes.
    Suffix(u64),
}

impl ByteRange {
    /// Resolve to inclusive `(from, until)` positions for an object of
    /// `total_size` bytes. Open ends are closed at the last byte.
    pub fn resolve(self, total_size: u64) -> Result<(u64, u64)> {
        let last = total_size
            .checked_sub(1)
            .ok_or(Error::RangeNotSatisfiable { total_size })?;

        match self {
            ByteRange::Bounded { start, end } => Ok((start, end)),
            ByteRange::From(start) => Ok((start, last)),
            ByteRange::Suffix(0) => Err(Error::RangeNotSatisfiable { total_size }),
            ByteRange::Suffix(len) => Ok((total_size - len.min(total_size), last)),
        }
    }

    /// Resolve and plan in one step.
    pub fn plan(self, total_size: u64, chunk_size: u64) -> Result<RangeWindow> {
        let (from, until) = self.resolve(total_size)?;
        plan(from, until, total_size, chunk_size)
    }
}

/// Parse a `Range` header value.
///
/// Supports formats:
/// - bytes=0-499
/// - bytes=500-
/// - bytes=-500 (last 500 bytes)
///
/// Returns `None` for anything else, including multi-range requests.
pub fn parse_range_header(value: &str) -> Option<ByteRange> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    if ranges.contains(',') {
        return None;
    }

    let (start, end) = ranges.split_once('-')?;
    let start = start.trim();
    let end = end.trim();

    match (start.is_empty(), end.is_empty()) {
        (true, false) => Some(ByteRange::Suffix(end.parse().ok()?)),
        (false, true) => Some(ByteRange::From(start.parse().ok()?)),
        (false, false) => Some(ByteRange::Bounded {
            start: start.parse().ok()?,
            end: end.parse().ok()?,
        }),
        (true, true) => None,
    }
}
