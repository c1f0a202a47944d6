//! Byte-range transports.
//!
//! Everything the reader needs from a container goes through
//! [`RangeSource::fetch_range`]. Sources are shared between concurrent batch
//! tasks, so implementations take `&self` and must be `Send + Sync`.

use crate::error::Result;
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;

mod buffered;
mod file;
#[cfg(feature = "http")]
mod http;
mod instrumented;
mod memory;

pub use buffered::{BufferedRangeClient, UsageStats};
pub use file::FileSource;
#[cfg(feature = "http")]
pub use http::HttpRangeSource;
pub use instrumented::{InstrumentedSource, SourceStats};
pub use memory::MemorySource;

/// Random access to the bytes of one container.
pub trait RangeSource: Send + Sync + 'static {
    /// Fetch up to `length` bytes starting at `offset`.
    ///
    /// May return fewer bytes than asked for when the range runs past the end
    /// of the data. Fails with `RangeNotSatisfiable` when `offset` is at or
    /// past the end and with `TransportUnavailable` (or `Io`) when the
    /// underlying transport fails.
    fn fetch_range(&self, offset: u64, length: usize)
    -> impl Future<Output = Result<Bytes>> + Send;

    /// Total size of the data, when the source knows it up front.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

impl<S: RangeSource> RangeSource for Arc<S> {
    fn fetch_range(
        &self,
        offset: u64,
        length: usize,
    ) -> impl Future<Output = Result<Bytes>> + Send {
        (**self).fetch_range(offset, length)
    }

    fn size_hint(&self) -> Option<u64> {
        (**self).size_hint()
    }
}

/// Clip `[offset, offset + length)` to a buffer of `size` bytes.
pub(crate) fn clip_range(
    offset: u64,
    length: usize,
    size: u64,
) -> Result<std::ops::Range<usize>> {
    if offset >= size {
        return Err(crate::error::FgbError::RangeNotSatisfiable { offset, length });
    }
    let end = offset.saturating_add(length as u64).min(size);
    let to_index = |value: u64| {
        usize::try_from(value).map_err(|_| {
            crate::error::FgbError::Overflow(format!("offset {value} exceeds addressable memory"))
        })
    };
    Ok(to_index(offset)?..to_index(end)?)
}
