//! Streaming bbox search over a packed R-tree read through range requests.
//!
//! The walk is breadth first. Each pending [`NodeRange`] is read as one
//! contiguous slab, and child ranges that land close to the most recently
//! queued range are folded into it, trading a few unneeded node bytes for
//! fewer round trips.

use super::packed_rtree::{NODE_ITEM_LEN, NodeItem, generate_level_bounds};
use crate::config::Config;
use crate::error::{FgbError, Result};
use bytes::Bytes;
use fgbstream_types::BoundingBox2D;
use futures::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::ops::Range;

/// Source of raw index bytes. Offsets are relative to the start of the index
/// region.
pub trait NodeReader: Send {
    fn read_nodes(
        &mut self,
        offset: usize,
        length: usize,
    ) -> impl Future<Output = Result<Bytes>> + Send;
}

/// An index region already held in memory.
impl NodeReader for Bytes {
    async fn read_nodes(&mut self, offset: usize, length: usize) -> Result<Bytes> {
        if offset + length > self.len() {
            return Err(FgbError::truncated(
                offset,
                length,
                self.len().saturating_sub(offset),
            ));
        }
        Ok(self.slice(offset..offset + length))
    }
}

/// A located feature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    /// Byte offset of the record relative to the feature region.
    pub offset: u64,
    /// Position of the leaf among all leaves.
    pub index: u64,
    /// Distance to the next leaf's record; `None` for the last leaf.
    pub length: Option<u64>,
}

/// Sibling node indices `[start, end)` at one tree level awaiting expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRange {
    start: usize,
    end: usize,
    level: usize,
}

impl NodeRange {
    pub fn new(start: usize, end: usize, level: usize) -> Self {
        Self { start, end, level }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Grow the range to reach `end`. Never shrinks.
    pub fn extend_end(&mut self, end: usize) {
        self.end = self.end.max(end);
    }
}

impl fmt::Display for NodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[level {}, nodes {}-{}]", self.level, self.start, self.end)
    }
}

struct SearchState<R> {
    reader: R,
    rect: BoundingBox2D,
    node_size: usize,
    level_bounds: Vec<Range<usize>>,
    /// Highest node index already scanned, per level.
    scanned: Vec<usize>,
    threshold_nodes: usize,
    max_pending: usize,
    queue: VecDeque<NodeRange>,
    ready: VecDeque<SearchResult>,
}

impl<R: NodeReader> SearchState<R> {
    async fn next(&mut self) -> Result<Option<SearchResult>> {
        loop {
            if let Some(hit) = self.ready.pop_front() {
                return Ok(Some(hit));
            }
            let Some(range) = self.queue.pop_front() else {
                return Ok(None);
            };
            log::debug!("popped node range {}, queue length {}", range, self.queue.len());
            self.expand(range).await?;
        }
    }

    async fn expand(&mut self, range: NodeRange) -> Result<()> {
        let level = range.level;
        let level_end = self.level_bounds[level].end;
        let leaf_start = self.level_bounds[0].start;
        let is_leaf = level == 0;

        let start = range.start.max(self.scanned[level]);
        let end = (range.end + self.node_size).min(level_end);
        if start >= end {
            return Ok(());
        }
        self.scanned[level] = end;
        // one extra leaf so the last hit's length is still derivable
        let read_end = if is_leaf { (end + 1).min(level_end) } else { end };

        let count = read_end - start;
        let buf = self
            .reader
            .read_nodes(start * NODE_ITEM_LEN, count * NODE_ITEM_LEN)
            .await?;
        if buf.len() < count * NODE_ITEM_LEN {
            return Err(FgbError::truncated(
                start * NODE_ITEM_LEN,
                count * NODE_ITEM_LEN,
                buf.len(),
            ));
        }

        for pos in start..end {
            let node = NodeItem::read(&buf, (pos - start) * NODE_ITEM_LEN)?;
            if !node.intersects(&self.rect) {
                continue;
            }

            if is_leaf {
                let length = if pos + 1 < level_end {
                    let next = NodeItem::read(&buf, (pos + 1 - start) * NODE_ITEM_LEN)?;
                    let length = next.offset.checked_sub(node.offset).ok_or_else(|| {
                        FgbError::InvalidIndex(format!(
                            "leaf offsets descend at node {} ({} then {})",
                            pos, node.offset, next.offset
                        ))
                    })?;
                    Some(length)
                } else {
                    None
                };
                self.ready.push_back(SearchResult {
                    offset: node.offset,
                    index: (pos - leaf_start) as u64,
                    length,
                });
                continue;
            }

            let child_level = level - 1;
            let child = usize::try_from(node.offset)
                .ok()
                .filter(|c| self.level_bounds[child_level].contains(c))
                .ok_or_else(|| {
                    FgbError::InvalidIndex(format!(
                        "node {} points to child {} outside level {} {:?}",
                        pos, node.offset, child_level, self.level_bounds[child_level]
                    ))
                })?;

            if let Some(nearest) = self.queue.back_mut()
                && nearest.level == child_level
                && child < nearest.end + self.threshold_nodes
            {
                log::debug!("merging child {} into pending range {}", child, nearest);
                nearest.extend_end(child);
                continue;
            }

            if self.queue.len() >= self.max_pending {
                return Err(FgbError::Overflow(format!(
                    "more than {} pending node ranges",
                    self.max_pending
                )));
            }
            let next = NodeRange::new(child, child + 1, child_level);
            log::debug!("queueing node range {}", next);
            self.queue.push_back(next);
        }
        Ok(())
    }
}

/// Search the index for items whose bounds intersect `rect`.
///
/// Returns a lazy stream of hits in index order. Reads go through `reader`,
/// one request per expanded node range.
pub fn stream_search<R: NodeReader>(
    num_items: u64,
    node_size: u16,
    rect: BoundingBox2D,
    config: &Config,
    reader: R,
) -> Result<impl Stream<Item = Result<SearchResult>> + Send + use<R>> {
    let (level_bounds, queue) = if num_items == 0 {
        (Vec::new(), VecDeque::new())
    } else {
        let bounds = generate_level_bounds(num_items, node_size)?;
        let root = NodeRange::new(0, 1, bounds.len() - 1);
        (bounds, VecDeque::from([root]))
    };
    log::info!("tree items: {}, node size: {}", num_items, node_size);

    let state = SearchState {
        reader,
        rect,
        node_size: usize::from(node_size),
        scanned: vec![0; level_bounds.len()],
        level_bounds,
        threshold_nodes: config.threshold_nodes(),
        max_pending: config.max_pending_ranges,
        queue,
        ready: VecDeque::new(),
    };

    Ok(futures::stream::try_unfold(state, |mut state| async move {
        Ok(state.next().await?.map(|hit| (hit, state)))
    }))
}
