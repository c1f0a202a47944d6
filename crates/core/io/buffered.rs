//! Single-window read buffer over a [`RangeSource`].

use super::RangeSource;
use crate::error::{FgbError, Result};
use bytes::Bytes;
use std::sync::Arc;

/// Byte accounting for one buffered client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub requests: u64,
    /// Bytes handed back to callers, buffer hits included.
    pub bytes_used: u64,
    /// Bytes actually fetched from the source.
    pub bytes_fetched: u64,
}

impl UsageStats {
    /// Share of fetched bytes that callers asked for, in percent.
    pub fn efficiency(&self) -> f64 {
        if self.bytes_fetched == 0 {
            return 0.0;
        }
        100.0 * self.bytes_used as f64 / self.bytes_fetched as f64
    }
}

/// Keeps the most recently fetched window and serves reads inside it without
/// another request.
///
/// A miss fetches `max(length, min_request)` bytes starting at the requested
/// offset and replaces the window.
pub struct BufferedRangeClient<S> {
    source: Arc<S>,
    buffer: Bytes,
    head: u64,
    stats: UsageStats,
}

impl<S: RangeSource> BufferedRangeClient<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            buffer: Bytes::new(),
            head: 0,
            stats: UsageStats::default(),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Read exactly `length` bytes at `offset`.
    pub async fn get_range(
        &mut self,
        offset: u64,
        length: usize,
        min_request: usize,
        purpose: &str,
    ) -> Result<Bytes> {
        self.stats.bytes_used += length as u64;

        if offset >= self.head {
            let start = (offset - self.head) as usize;
            if start + length <= self.buffer.len() {
                return Ok(self.buffer.slice(start..start + length));
            }
        }

        let to_fetch = length.max(min_request);
        log::debug!(
            "requesting new range for {}: {}-{} ({} bytes)",
            purpose,
            offset,
            offset + length as u64,
            to_fetch
        );
        let data = self.source.fetch_range(offset, to_fetch).await?;
        self.stats.requests += 1;
        self.stats.bytes_fetched += data.len() as u64;

        if data.len() < length {
            return Err(FgbError::truncated(offset as usize, length, data.len()));
        }
        self.buffer = data;
        self.head = offset;
        Ok(self.buffer.slice(..length))
    }

    pub fn stats(&self) -> UsageStats {
        self.stats
    }

    /// Log used versus fetched bytes under the first word of `purpose`.
    pub fn log_usage(&self, purpose: &str) {
        let category = purpose.split(' ').next().unwrap_or(purpose);
        log::info!(
            "{} bytes used/requested: {} / {} = {:.2}%",
            category,
            self.stats.bytes_used,
            self.stats.bytes_fetched,
            self.stats.efficiency()
        );
    }
}
