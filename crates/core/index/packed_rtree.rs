//! Packed Hilbert R-tree layout: node records and level arithmetic.
//!
//! The tree is a flat array of 40-byte nodes with the root at index 0 and
//! the leaves at the end. Level boundaries follow from the item count and
//! branching factor alone.

use crate::codec::table::{read_f64, read_u32};
use crate::error::{FgbError, Result};
use fgbstream_types::BoundingBox2D;
use std::ops::Range;

/// Size of one encoded node: four f64 bounds plus a u64 offset.
pub const NODE_ITEM_LEN: usize = 8 * 4 + 8;
pub const DEFAULT_NODE_SIZE: u16 = 16;

/// Largest offset representable without loss, 2^52 - 1.
const MAX_SAFE_OFFSET: u64 = (1 << 52) - 1;

/// One decoded index node.
///
/// For a leaf, `offset` is the byte offset of the feature record relative to
/// the start of the feature region. For an internal node it is the node
/// index of its first child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeItem {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub offset: u64,
}

impl NodeItem {
    /// Decode the node stored at byte `pos` of `buf`.
    pub fn read(buf: &[u8], pos: usize) -> Result<Self> {
        Ok(Self {
            min_x: read_f64(buf, pos)?,
            min_y: read_f64(buf, pos + 8)?,
            max_x: read_f64(buf, pos + 16)?,
            max_y: read_f64(buf, pos + 24)?,
            offset: read_uint52(buf, pos + 32)?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        for v in [self.min_x, self.min_y, self.max_x, self.max_y] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&self.offset.to_le_bytes());
    }

    #[inline]
    pub fn intersects(&self, rect: &BoundingBox2D) -> bool {
        rect.intersects_bounds(self.min_x, self.min_y, self.max_x, self.max_y)
    }

    pub fn bounds(&self) -> BoundingBox2D {
        BoundingBox2D::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Read a u64 as two 32-bit halves, rejecting values at or above 2^52.
fn read_uint52(buf: &[u8], pos: usize) -> Result<u64> {
    let low = read_u32(buf, pos)?;
    let high = read_u32(buf, pos + 4)?;
    if high & 0xfff0_0000 != 0 {
        return Err(FgbError::InvalidIndex(format!(
            "node offset at byte {} exceeds 2^52",
            pos
        )));
    }
    let value = (u64::from(high) << 32) | u64::from(low);
    debug_assert!(value <= MAX_SAFE_OFFSET);
    Ok(value)
}

fn level_sizes(num_items: u64, node_size: u64) -> Vec<u64> {
    let mut n = num_items;
    let mut sizes = vec![n];
    loop {
        n = n.div_ceil(node_size);
        sizes.push(n);
        if n == 1 {
            break;
        }
    }
    sizes
}

/// Byte length of the index region for `num_items` items.
///
/// The branching factor is clamped to `[2, 65535]`. A single item still gets
/// a root above its leaf. No items means no index.
pub fn calc_tree_size(num_items: u64, node_size: u16) -> Result<usize> {
    if num_items == 0 {
        return Ok(0);
    }
    let node_size = u64::from(node_size.max(2));
    let num_nodes: u64 = level_sizes(num_items, node_size).iter().sum();
    num_nodes
        .checked_mul(NODE_ITEM_LEN as u64)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or_else(|| FgbError::InvalidIndex(format!("index for {} items is too large", num_items)))
}

/// Half-open node index ranges per level. Level 0 holds the leaves and sits
/// at the end of the node array; the last level is the root at index 0.
pub fn generate_level_bounds(num_items: u64, node_size: u16) -> Result<Vec<Range<usize>>> {
    if node_size < 2 {
        return Err(FgbError::InvalidIndex(
            "node size must be at least 2".into(),
        ));
    }
    if num_items == 0 {
        return Err(FgbError::InvalidIndex(
            "number of items must be greater than 0".into(),
        ));
    }
    let sizes = level_sizes(num_items, u64::from(node_size));
    let to_usize = |n: u64| {
        usize::try_from(n).map_err(|_| FgbError::InvalidIndex(format!("{} nodes is too many", n)))
    };
    let mut end = to_usize(sizes.iter().sum())?;
    let mut bounds = Vec::with_capacity(sizes.len());
    for size in sizes {
        let size = to_usize(size)?;
        bounds.push(end - size..end);
        end -= size;
    }
    Ok(bounds)
}
