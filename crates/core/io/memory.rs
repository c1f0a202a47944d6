use super::{RangeSource, clip_range};
use crate::error::Result;
use bytes::Bytes;

/// A container held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl RangeSource for MemorySource {
    async fn fetch_range(&self, offset: u64, length: usize) -> Result<Bytes> {
        let range = clip_range(offset, length, self.data.len() as u64)?;
        Ok(self.data.slice(range))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}
