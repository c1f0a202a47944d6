//! Reader sessions over a [`RangeSource`].
//!
//! [`FgbReader::open`] loads the header and sizes the index. Queries then
//! search the index, plan batches, and merge one feature stream per batch
//! into a single [`FeatureStream`].

use crate::batch::{BatchPlanner, BatchReader};
use crate::codec::table::read_u32;
use crate::codec::{
    Feature, HEADER_PREFIX_LEN, MAGIC_BYTES, SIZE_PREFIX_LEN, check_header_len, check_magic,
    decode_header,
};
use crate::config::Config;
use crate::error::{FgbError, Result};
use crate::index::{NodeReader, calc_tree_size, stream_search};
use crate::io::{BufferedRangeClient, RangeSource, UsageStats};
use crate::merge::StreamMerge;
use bytes::Bytes;
use fgbstream_types::{BoundingBox2D, Header};
use futures::{Stream, StreamExt, TryStreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

/// Lifecycle of a session and of the streams it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    HeaderLoaded,
    IndexReady,
    Streaming,
    Done,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "closed",
            SessionState::HeaderLoaded => "header loaded",
            SessionState::IndexReady => "index ready",
            SessionState::Streaming => "streaming",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An open container.
pub struct FgbReader<S> {
    source: Arc<S>,
    /// Serves the header and every index read, so the prefetched window
    /// covers the top tree levels.
    client: BufferedRangeClient<S>,
    header: Arc<Header>,
    header_len: usize,
    index_len: usize,
    config: Config,
    failed: Arc<AtomicBool>,
}

impl<S: RangeSource> FgbReader<S> {
    pub async fn open(source: S) -> Result<Self> {
        Self::open_with_config(Arc::new(source), Config::default()).await
    }

    /// Verify the magic bytes, decode the header and size the index.
    pub async fn open_with_config(source: Arc<S>, config: Config) -> Result<Self> {
        config.validate()?;
        let mut client = BufferedRangeClient::new(source.clone());
        let min_request = config.header_prefetch_bytes;
        log::debug!("fetching header, min request {} bytes", min_request);

        let magic = client
            .get_range(0, MAGIC_BYTES.len(), min_request, "header")
            .await?;
        check_magic(&magic)?;
        log::debug!("magic bytes look good");

        let prefix = client
            .get_range(MAGIC_BYTES.len() as u64, SIZE_PREFIX_LEN, min_request, "header")
            .await?;
        let header_len = check_header_len(read_u32(&prefix, 0)?, config.max_header_bytes)?;
        log::debug!("header length: {}", header_len);

        let header_bytes = client
            .get_range(HEADER_PREFIX_LEN as u64, header_len, min_request, "header")
            .await?;
        let header = decode_header(&header_bytes)?;
        log::debug!("session state: {}", SessionState::HeaderLoaded);

        let index_len = if header.index_node_size > 0 {
            calc_tree_size(header.features_count, header.index_node_size)?
        } else {
            0
        };
        log::debug!(
            "session state: {} ({} features, index {} bytes)",
            SessionState::IndexReady,
            header.features_count,
            index_len
        );

        Ok(Self {
            source,
            client,
            header: Arc::new(header),
            header_len,
            index_len,
            config,
            failed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn index_len(&self) -> usize {
        self.index_len
    }

    /// Absolute offset of the index region.
    pub fn tree_offset(&self) -> u64 {
        (HEADER_PREFIX_LEN + self.header_len) as u64
    }

    /// Absolute offset of the feature region.
    pub fn features_offset(&self) -> u64 {
        self.tree_offset() + self.index_len as u64
    }

    pub fn state(&self) -> SessionState {
        if self.failed.load(Ordering::Acquire) {
            SessionState::Failed
        } else {
            SessionState::IndexReady
        }
    }

    /// Byte accounting for header and index reads.
    pub fn usage(&self) -> UsageStats {
        self.client.stats()
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state() {
            SessionState::Failed => Err(FgbError::SessionFailed),
            _ => Ok(()),
        }
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_fatal()
        {
            log::warn!("session failed: {}", e);
            self.failed.store(true, Ordering::Release);
        }
        result
    }

    /// Features whose index bounds intersect `rect`.
    ///
    /// Containers without an index fall back to a scan filtered by each
    /// feature's geometry bounds.
    pub async fn select_bbox(&mut self, rect: BoundingBox2D) -> Result<FeatureStream> {
        self.ensure_usable()?;
        if !self.header.is_indexed() {
            log::info!("container has no index, scanning with bbox filter");
            return Ok(self.scan(Some(rect)));
        }
        let planned = self.plan(rect).await;
        let batches = self.record(planned)?;
        log::info!("reading {} feature batches", batches.len());

        let features_offset = self.features_offset();
        let inputs: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                BatchReader::new(
                    self.source.clone(),
                    batch,
                    features_offset,
                    self.header.clone(),
                    self.config.max_geometry_depth,
                )
                .into_stream()
            })
            .collect();
        Ok(FeatureStream::new(
            StreamMerge::new(inputs, self.config.merge_channel_capacity),
            self.failed.clone(),
        ))
    }

    pub async fn query_bbox(
        &mut self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Result<FeatureStream> {
        self.select_bbox(BoundingBox2D::new(min_x, min_y, max_x, max_y))
            .await
    }

    /// Every feature in stored order, ignoring the index.
    pub fn scan_all(&mut self) -> Result<FeatureStream> {
        self.ensure_usable()?;
        Ok(self.scan(None))
    }

    async fn plan(&mut self, rect: BoundingBox2D) -> Result<Vec<crate::batch::Batch>> {
        let mut planner = BatchPlanner::new(&self.config);
        {
            let index = IndexClient {
                client: &mut self.client,
                tree_offset: (HEADER_PREFIX_LEN + self.header_len) as u64,
            };
            let hits = stream_search(
                self.header.features_count,
                self.header.index_node_size,
                rect,
                &self.config,
                index,
            )?;
            futures::pin_mut!(hits);
            while let Some(hit) = hits.try_next().await? {
                planner.push(hit)?;
            }
        }
        self.client.log_usage("header+index");
        planner.finish()
    }

    fn scan(&self, rect: Option<BoundingBox2D>) -> FeatureStream {
        let count = self.header.features_count;
        let scan = ScanReader {
            client: BufferedRangeClient::new(self.source.clone()),
            offset: self.features_offset(),
            remaining: (count > 0).then_some(count),
            end: self.source.size_hint(),
            min_request: self.config.scan_request_bytes,
            rect,
            header: self.header.clone(),
            max_depth: self.config.max_geometry_depth,
        };
        FeatureStream::new(
            StreamMerge::new([scan.into_stream()], self.config.merge_channel_capacity),
            self.failed.clone(),
        )
    }
}

impl<S> fmt::Debug for FgbReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FgbReader")
            .field("header_len", &self.header_len)
            .field("index_len", &self.index_len)
            .field("features_count", &self.header.features_count)
            .field("failed", &self.failed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Index reads routed through the session's buffered client.
struct IndexClient<'a, S> {
    client: &'a mut BufferedRangeClient<S>,
    tree_offset: u64,
}

impl<S: RangeSource> NodeReader for IndexClient<'_, S> {
    async fn read_nodes(&mut self, offset: usize, length: usize) -> Result<Bytes> {
        self.client
            .get_range(self.tree_offset + offset as u64, length, 0, "index")
            .await
    }
}

/// Sequential walk of the feature region.
struct ScanReader<S> {
    client: BufferedRangeClient<S>,
    offset: u64,
    /// Records left to read, when the header declares a count.
    remaining: Option<u64>,
    end: Option<u64>,
    min_request: usize,
    rect: Option<BoundingBox2D>,
    header: Arc<Header>,
    max_depth: usize,
}

impl<S: RangeSource> ScanReader<S> {
    async fn next_record(&mut self) -> Result<Option<Bytes>> {
        match self.remaining {
            Some(0) => return Ok(None),
            None if self.end.is_some_and(|end| self.offset >= end) => return Ok(None),
            _ => {}
        }
        let prefix = match self
            .client
            .get_range(self.offset, SIZE_PREFIX_LEN, self.min_request, "scan length")
            .await
        {
            Ok(prefix) => prefix,
            Err(FgbError::RangeNotSatisfiable { .. }) if self.remaining.is_none() => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let length = read_u32(&prefix, 0)? as usize;
        let record = self
            .client
            .get_range(
                self.offset + SIZE_PREFIX_LEN as u64,
                length,
                self.min_request,
                "scan data",
            )
            .await?;
        self.offset += (SIZE_PREFIX_LEN + length) as u64;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(Some(record))
    }

    async fn next_feature(&mut self) -> Result<Option<Feature>> {
        while let Some(record) = self.next_record().await? {
            let feature = Feature::decode(&record, &self.header, self.max_depth)?;
            match &self.rect {
                Some(rect) if !feature.bounds().is_some_and(|b| b.intersects(rect)) => continue,
                _ => return Ok(Some(feature)),
            }
        }
        self.client.log_usage("scan");
        Ok(None)
    }

    fn into_stream(self) -> impl Stream<Item = Result<Feature>> + Send + 'static {
        futures::stream::try_unfold(self, |mut scan| async move {
            Ok(scan.next_feature().await?.map(|feature| (feature, scan)))
        })
    }
}

/// Lazy sequence of decoded features returned by a query.
///
/// Features from different batches arrive in completion order. The stream
/// ends after the first error, cancelling every batch still running.
pub struct FeatureStream {
    merge: Option<StreamMerge<Result<Feature>>>,
    state: SessionState,
    session_failed: Arc<AtomicBool>,
    yielded: u64,
}

impl FeatureStream {
    fn new(merge: StreamMerge<Result<Feature>>, session_failed: Arc<AtomicBool>) -> Self {
        Self {
            merge: Some(merge),
            state: SessionState::Streaming,
            session_failed,
            yielded: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Features handed out so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Stop every batch and wait until its task has finished.
    pub async fn close(mut self) {
        if self.state == SessionState::Streaming {
            self.state = SessionState::Done;
        }
        if let Some(merge) = self.merge.take() {
            merge.close().await;
        }
    }
}

impl Stream for FeatureStream {
    type Item = Result<Feature>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state != SessionState::Streaming {
            return Poll::Ready(None);
        }
        let Some(merge) = this.merge.as_mut() else {
            return Poll::Ready(None);
        };
        match merge.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(feature))) => {
                this.yielded += 1;
                Poll::Ready(Some(Ok(feature)))
            }
            Poll::Ready(Some(Err(e))) => {
                merge.cancel();
                this.state = SessionState::Failed;
                if e.is_fatal() {
                    this.session_failed.store(true, Ordering::Release);
                }
                log::warn!("feature stream failed after {} features: {}", this.yielded, e);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.state = SessionState::Done;
                Poll::Ready(None)
            }
        }
    }
}

impl fmt::Debug for FeatureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureStream")
            .field("state", &self.state)
            .field("yielded", &self.yielded)
            .finish()
    }
}
