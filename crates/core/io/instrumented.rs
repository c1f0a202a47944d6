use super::RangeSource;
use crate::error::Result;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};

/// Request counters shared by every client reading through one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub requests: u64,
    /// Sum of requested lengths.
    pub bytes_requested: u64,
    /// Sum of returned lengths.
    pub bytes_received: u64,
}

/// Wraps a source and counts the requests made through it.
#[derive(Debug, Default)]
pub struct InstrumentedSource<S> {
    inner: S,
    requests: AtomicU64,
    bytes_requested: AtomicU64,
    bytes_received: AtomicU64,
}

impl<S> InstrumentedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            requests: AtomicU64::new(0),
            bytes_requested: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            requests: self.requests.load(Ordering::Relaxed),
            bytes_requested: self.bytes_requested.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

impl<S: RangeSource> RangeSource for InstrumentedSource<S> {
    async fn fetch_range(&self, offset: u64, length: usize) -> Result<Bytes> {
        let count = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.bytes_requested.fetch_add(length as u64, Ordering::Relaxed) + length as u64;
        log::info!(
            "request: #{}, bytes: (this_request: {}, ever: {}), range: {}-{}",
            count,
            length,
            total,
            offset,
            offset + length as u64
        );
        let bytes = self.inner.fetch_range(offset, length).await?;
        self.bytes_received
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(bytes)
    }

    fn size_hint(&self) -> Option<u64> {
        self.inner.size_hint()
    }
}
