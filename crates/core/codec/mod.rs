//! Record decoding and encoding for the container's binary layout.
//!
//! ```text
//! 0..8            magic  "fgb" 0x03 "fgb" 0x00
//! 8..12           header length, u32 LE
//! 12..12+len      Header table
//! index region    packed R-tree nodes (absent when index_node_size == 0)
//! feature region  repeated: u32 LE length, Feature table
//! ```

pub mod builder;
pub mod encode;
pub mod feature;
pub mod geometry;
pub mod header;
pub mod properties;
pub mod table;

use crate::error::{FgbError, Result};

pub use builder::TableBuilder;
pub use encode::{ContainerWriter, PropertyEncoder, encode_feature, encode_header};
pub use feature::{Feature, FeatureView, decode_container};
pub use geometry::{GeometryView, decode_geometry};
pub use header::decode_header;
pub use properties::decode_properties;
pub use table::Table;

pub const VERSION: u8 = 3;
pub const MAGIC_BYTES: [u8; 8] = [b'f', b'g', b'b', VERSION, b'f', b'g', b'b', 0];
/// Width of every length prefix in the layout.
pub const SIZE_PREFIX_LEN: usize = 4;
/// Bytes before the header table: magic plus header length.
pub const HEADER_PREFIX_LEN: usize = MAGIC_BYTES.len() + SIZE_PREFIX_LEN;

/// Check the format signature. Only the first three bytes are binding; an
/// unexpected version byte is tolerated with a warning.
pub fn check_magic(bytes: &[u8]) -> Result<()> {
    if bytes.len() < 3 {
        return Err(FgbError::truncated(0, 3, bytes.len()));
    }
    if bytes[..3] != MAGIC_BYTES[..3] {
        return Err(FgbError::InvalidMagic([bytes[0], bytes[1], bytes[2]]));
    }
    if let Some(&version) = bytes.get(3)
        && version != VERSION
    {
        log::warn!(
            "Unexpected format version {} (expected {}), decoding anyway",
            version,
            VERSION
        );
    }
    log::debug!("magic bytes look good");
    Ok(())
}

/// Validate a header length against the configured upper bound.
pub fn check_header_len(len: u32, max: usize) -> Result<usize> {
    let len = len as usize;
    if len < 8 || len > max {
        return Err(FgbError::InvalidHeaderSize {
            size: len as u64,
            max,
        });
    }
    Ok(len)
}
