//! Packed Hilbert R-tree: node layout and streaming bbox search.

pub mod packed_rtree;
pub mod search;

pub use packed_rtree::{
    DEFAULT_NODE_SIZE, NODE_ITEM_LEN, NodeItem, calc_tree_size, generate_level_bounds,
};
pub use search::{NodeRange, NodeReader, SearchResult, stream_search};
