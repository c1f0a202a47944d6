mod common;

use bytes::Bytes;
use common::{build_indexed, expected_ids, ids, point_grid, point_header};
use fgbstream::{
    BoundingBox2D, Config, Feature, MemorySource, RangeSource, ReaderBuilder, SessionState,
    to_feature_collection,
};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Adds latency to every fetch and tracks how many are outstanding.
struct SlowSource {
    inner: MemorySource,
    delay: Duration,
    in_flight: AtomicUsize,
}

impl SlowSource {
    fn new(bytes: Vec<u8>, delay: Duration) -> Self {
        Self {
            inner: MemorySource::new(bytes),
            delay,
            in_flight: AtomicUsize::new(0),
        }
    }
}

impl RangeSource for SlowSource {
    async fn fetch_range(&self, offset: u64, length: usize) -> fgbstream::Result<Bytes> {
        let _guard = InFlight::enter(&self.in_flight);
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_range(offset, length).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_batches_complete() -> anyhow::Result<()> {
    let features = point_grid(12);
    let bytes = build_indexed(point_header(), &features, 4)?;
    let source = Arc::new(SlowSource::new(bytes, Duration::from_millis(2)));
    let mut reader = ReaderBuilder::new()
        .config(Config::default().with_extra_request_threshold(0))
        .open_shared(source.clone())
        .await?;

    let rect = BoundingBox2D::new(2.0, 2.0, 9.0, 6.0);
    let found: Vec<Feature> = reader.select_bbox(rect).await?.try_collect().await?;
    assert_eq!(ids(&found), expected_ids(&features, &rect));
    assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_single_batch_keeps_offset_order() -> anyhow::Result<()> {
    let features = point_grid(10);
    let bytes = build_indexed(point_header(), &features, 4)?;
    let mut reader = ReaderBuilder::new().open_bytes(bytes).await?;

    let rect = BoundingBox2D::new(0.0, 0.0, 9.0, 4.0);
    let found: Vec<Feature> = reader.select_bbox(rect).await?.try_collect().await?;
    let in_order: Vec<_> = found.iter().map(|f| f.properties["id"].clone()).collect();
    let mut sorted = in_order.clone();
    sorted.sort_by_key(|v| match v {
        fgbstream_types::ColumnValue::Int(i) => *i,
        _ => i32::MAX,
    });
    assert_eq!(in_order, sorted);
    assert_eq!(found.len(), 50);
    Ok(())
}

#[tokio::test]
async fn test_close_leaves_no_fetch_in_flight() -> anyhow::Result<()> {
    let features = point_grid(12);
    let bytes = build_indexed(point_header(), &features, 4)?;
    let source = Arc::new(SlowSource::new(bytes, Duration::from_millis(20)));
    let mut reader = ReaderBuilder::new()
        .config(Config::default().with_extra_request_threshold(0))
        .open_shared(source.clone())
        .await?;

    let mut stream = reader
        .select_bbox(BoundingBox2D::new(0.0, 0.0, 11.0, 11.0))
        .await?;
    assert!(stream.next().await.transpose()?.is_some());
    assert_eq!(stream.state(), SessionState::Streaming);

    stream.close().await;
    assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(reader.state(), SessionState::IndexReady);
    Ok(())
}

#[tokio::test]
async fn test_dropped_stream_does_not_fail_session() -> anyhow::Result<()> {
    let features = point_grid(6);
    let bytes = build_indexed(point_header(), &features, 4)?;
    let mut reader = ReaderBuilder::new().open_bytes(bytes).await?;

    let mut stream = reader.scan_all()?;
    assert!(stream.next().await.is_some());
    drop(stream);

    let all: Vec<Feature> = reader.scan_all()?.try_collect().await?;
    assert_eq!(all.len(), 36);
    Ok(())
}

#[tokio::test]
async fn test_query_to_feature_collection() -> anyhow::Result<()> {
    let features = point_grid(5);
    let bytes = build_indexed(point_header(), &features, 16)?;
    let mut reader = ReaderBuilder::new().open_bytes(bytes).await?;

    let found: Vec<Feature> = reader
        .query_bbox(0.0, 0.0, 1.0, 1.0)
        .await?
        .try_collect()
        .await?;
    let collection = serde_json::to_value(to_feature_collection(&found))?;
    assert_eq!(collection["type"], "FeatureCollection");
    assert_eq!(collection["features"].as_array().map(Vec::len), Some(4));
    Ok(())
}
