//! Reader configuration.
//!
//! Every tuning knob is carried by an explicit [`Config`] value handed to the
//! reader, the index search and the batch planner, so concurrent sessions
//! never share mutable settings.
use crate::error::{FgbError, Result};
use crate::index::NODE_ITEM_LEN;

/// Reader configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Byte gap below which adjacent index reads and feature reads are merged
    /// into one request. Also the guessed length of the last feature.
    #[serde(default = "Config::default_extra_request_threshold")]
    pub extra_request_threshold: usize,

    /// Minimum request length while reading magic, header and the top of the index.
    #[serde(default = "Config::default_header_prefetch_bytes")]
    pub header_prefetch_bytes: usize,

    #[serde(default = "Config::default_max_header_bytes")]
    pub max_header_bytes: usize,

    /// Nesting limit for geometry collections and multi-part geometries.
    #[serde(default = "Config::default_max_geometry_depth")]
    pub max_geometry_depth: usize,

    /// Hard cap on pending node ranges during an index search.
    #[serde(default = "Config::default_max_pending_ranges")]
    pub max_pending_ranges: usize,

    #[serde(default = "Config::default_max_batches")]
    pub max_batches: usize,

    /// Per-batch channel capacity used when merging batch streams.
    #[serde(default = "Config::default_merge_channel_capacity")]
    pub merge_channel_capacity: usize,

    /// Minimum request length for a sequential full scan.
    #[serde(default = "Config::default_scan_request_bytes")]
    pub scan_request_bytes: usize,
}

impl Config {
    /// Assumed header size used to size the initial prefetch.
    pub const ASSUMED_HEADER_BYTES: usize = 2024;
    /// Tree levels fetched together with the header, at branching factor 16.
    pub const PREFETCH_INDEX_NODES: usize = 1 + 16 + 256;

    const fn default_extra_request_threshold() -> usize {
        256 * 1024
    }

    const fn default_header_prefetch_bytes() -> usize {
        Self::ASSUMED_HEADER_BYTES + Self::PREFETCH_INDEX_NODES * NODE_ITEM_LEN
    }

    const fn default_max_header_bytes() -> usize {
        10 * 1024 * 1024
    }

    const fn default_max_geometry_depth() -> usize {
        32
    }

    const fn default_max_pending_ranges() -> usize {
        1 << 20
    }

    const fn default_max_batches() -> usize {
        1 << 20
    }

    const fn default_merge_channel_capacity() -> usize {
        1
    }

    const fn default_scan_request_bytes() -> usize {
        256 * 1024
    }

    pub fn with_extra_request_threshold(mut self, bytes: usize) -> Self {
        self.extra_request_threshold = bytes;
        self
    }

    pub fn with_header_prefetch_bytes(mut self, bytes: usize) -> Self {
        self.header_prefetch_bytes = bytes;
        self
    }

    pub fn with_max_header_bytes(mut self, bytes: usize) -> Self {
        self.max_header_bytes = bytes;
        self
    }

    pub fn with_max_geometry_depth(mut self, depth: usize) -> Self {
        self.max_geometry_depth = depth;
        self
    }

    pub fn with_max_pending_ranges(mut self, cap: usize) -> Self {
        self.max_pending_ranges = cap;
        self
    }

    pub fn with_max_batches(mut self, cap: usize) -> Self {
        self.max_batches = cap;
        self
    }

    pub fn with_merge_channel_capacity(mut self, capacity: usize) -> Self {
        if capacity > 1024 {
            log::warn!(
                "Merge channel capacity of {} buffers that many decoded features per batch",
                capacity
            );
        }
        self.merge_channel_capacity = capacity;
        self
    }

    pub fn with_scan_request_bytes(mut self, bytes: usize) -> Self {
        self.scan_request_bytes = bytes;
        self
    }

    /// Merge threshold for index reads, in nodes.
    pub fn threshold_nodes(&self) -> usize {
        self.extra_request_threshold / NODE_ITEM_LEN
    }

    pub fn validate(&self) -> Result<()> {
        if self.header_prefetch_bytes < 12 {
            return Err(FgbError::InvalidConfig(
                "header_prefetch_bytes must cover magic and header length (12 bytes)".into(),
            ));
        }
        if self.max_header_bytes < 8 {
            return Err(FgbError::InvalidConfig(
                "max_header_bytes must be at least 8".into(),
            ));
        }
        if self.max_geometry_depth == 0 {
            return Err(FgbError::InvalidConfig(
                "max_geometry_depth must be greater than zero".into(),
            ));
        }
        if self.max_pending_ranges == 0 || self.max_batches == 0 {
            return Err(FgbError::InvalidConfig(
                "queue caps must be greater than zero".into(),
            ));
        }
        if self.merge_channel_capacity == 0 {
            return Err(FgbError::InvalidConfig(
                "merge_channel_capacity must be greater than zero".into(),
            ));
        }
        if self.scan_request_bytes == 0 {
            return Err(FgbError::InvalidConfig(
                "scan_request_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| FgbError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(toml_str).map_err(|e| FgbError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extra_request_threshold: Self::default_extra_request_threshold(),
            header_prefetch_bytes: Self::default_header_prefetch_bytes(),
            max_header_bytes: Self::default_max_header_bytes(),
            max_geometry_depth: Self::default_max_geometry_depth(),
            max_pending_ranges: Self::default_max_pending_ranges(),
            max_batches: Self::default_max_batches(),
            merge_channel_capacity: Self::default_merge_channel_capacity(),
            scan_request_bytes: Self::default_scan_request_bytes(),
        }
    }
}
