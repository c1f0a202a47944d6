//! Reader builder for flexible configuration
//!
//! Collects a [`Config`] and opens a reader over any [`RangeSource`], a local
//! file, an in-memory buffer or (with the `http` feature) a URL.

use crate::config::Config;
use crate::error::Result;
use crate::io::{FileSource, MemorySource, RangeSource};
use crate::reader::FgbReader;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

/// Builder for reader sessions.
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    config: Config,
}

impl ReaderBuilder {
    /// Create a new builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Gap tolerance for merging index and feature reads.
    pub fn extra_request_threshold(mut self, bytes: usize) -> Self {
        self.config = self.config.with_extra_request_threshold(bytes);
        self
    }

    pub fn merge_channel_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_merge_channel_capacity(capacity);
        self
    }

    pub fn max_geometry_depth(mut self, depth: usize) -> Self {
        self.config = self.config.with_max_geometry_depth(depth);
        self
    }

    /// Open a reader over an arbitrary source.
    pub async fn open<S: RangeSource>(self, source: S) -> Result<FgbReader<S>> {
        self.open_shared(Arc::new(source)).await
    }

    /// Open a reader over a source that the caller keeps a handle to, for
    /// example to read its request counters afterwards.
    pub async fn open_shared<S: RangeSource>(self, source: Arc<S>) -> Result<FgbReader<S>> {
        FgbReader::open_with_config(source, self.config).await
    }

    pub async fn open_file(self, path: impl AsRef<Path>) -> Result<FgbReader<FileSource>> {
        let source = FileSource::open(path).await?;
        self.open(source).await
    }

    pub async fn open_bytes(self, bytes: impl Into<Bytes>) -> Result<FgbReader<MemorySource>> {
        self.open(MemorySource::new(bytes)).await
    }

    #[cfg(feature = "http")]
    pub async fn open_url(
        self,
        url: impl Into<String>,
    ) -> Result<FgbReader<crate::io::HttpRangeSource>> {
        let source = crate::io::HttpRangeSource::new(url)?;
        self.open(source).await
    }
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
