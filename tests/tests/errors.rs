mod common;

use bytes::Bytes;
use common::{build_indexed, drain, point_grid, point_header};
use fgbstream::codec::encode::encode_geometry;
use fgbstream::codec::{MAGIC_BYTES, TableBuilder, encode_header};
use fgbstream::{
    BoundingBox2D, Config, ErrorKind, FgbError, MemorySource, RangeSource, ReaderBuilder,
    SessionState,
};
use fgbstream_types::{Column, ColumnType, Coord, Geometry, GeometryType, Header};

fn with_header(header_bytes: &[u8], rest: &[u8]) -> Vec<u8> {
    let mut out = MAGIC_BYTES.to_vec();
    out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(header_bytes);
    out.extend_from_slice(rest);
    out
}

fn everything() -> BoundingBox2D {
    BoundingBox2D::new(-1000.0, -1000.0, 1000.0, 1000.0)
}

#[tokio::test]
async fn test_bad_magic() {
    let result = ReaderBuilder::new()
        .open_bytes(&b"GIF89a\0\0\0\0\0\0"[..])
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, FgbError::InvalidMagic(magic) if &magic == b"GIF"));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[tokio::test]
async fn test_header_length_bounds() {
    for len in [4u32, 11 * 1024 * 1024] {
        let mut bytes = MAGIC_BYTES.to_vec();
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        let err = ReaderBuilder::new().open_bytes(bytes).await.unwrap_err();
        assert!(
            matches!(err, FgbError::InvalidHeaderSize { size, .. } if size == u64::from(len)),
            "{:?}",
            err
        );
    }
}

#[tokio::test]
async fn test_unknown_geometry_type_in_header() {
    let header = TableBuilder::new().add_u8(2, 99).finish();
    let err = ReaderBuilder::new()
        .open_bytes(with_header(&header, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, FgbError::UnknownGeometryType(99)));
}

#[tokio::test]
async fn test_corrupt_index_fails_session() -> anyhow::Result<()> {
    let bytes = build_indexed(point_header(), &point_grid(10), 4)?;
    let reader = ReaderBuilder::new().open_bytes(bytes.clone()).await?;
    let root_offset = reader.tree_offset() as usize + 32;

    // point the root at a node outside the level below it
    let mut corrupt = bytes;
    corrupt[root_offset..root_offset + 8].copy_from_slice(&99_999u64.to_le_bytes());
    let mut reader = ReaderBuilder::new().open_bytes(corrupt).await?;

    let err = reader.select_bbox(everything()).await.unwrap_err();
    assert!(matches!(err, FgbError::InvalidIndex(_)), "{:?}", err);
    assert_eq!(reader.state(), SessionState::Failed);
    assert!(matches!(
        reader.select_bbox(everything()).await,
        Err(FgbError::SessionFailed)
    ));
    assert!(matches!(reader.scan_all(), Err(FgbError::SessionFailed)));
    Ok(())
}

#[tokio::test]
async fn test_bad_column_index_stops_stream() -> anyhow::Result<()> {
    let mut header = Header::new(GeometryType::Point);
    header.columns = vec![Column::new("name", ColumnType::String)];
    header.index_node_size = 0;
    header.features_count = 2;

    let good = fgbstream::codec::encode_feature(
        &fgbstream::Feature::new(Geometry::Point(Coord::new(0.0, 0.0))).with_property("name", "ok"),
        &header.columns,
    )?;
    // column 7 does not exist
    let bad = TableBuilder::new()
        .add_table(0, encode_geometry(&Geometry::Point(Coord::new(1.0, 1.0)))?)
        .add_bytes(1, &[7, 0, 1, 0, 0, 0, b'x'])
        .finish();

    let mut records = Vec::new();
    for record in [&good, &bad] {
        records.extend_from_slice(&(record.len() as u32).to_le_bytes());
        records.extend_from_slice(record);
    }
    let bytes = with_header(&encode_header(&header), &records);

    let mut reader = ReaderBuilder::new().open_bytes(bytes).await?;
    let stream = reader.scan_all()?;
    let (features, err) = drain(stream).await;
    assert_eq!(features.len(), 1);
    assert!(matches!(
        err,
        Some(FgbError::ColumnIndexOutOfRange { index: 7, count: 1 })
    ));
    assert_eq!(reader.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test]
async fn test_batch_cap_overflow() -> anyhow::Result<()> {
    let bytes = build_indexed(point_header(), &point_grid(10), 4)?;
    let config = Config::default()
        .with_extra_request_threshold(0)
        .with_max_batches(3);
    let mut reader = ReaderBuilder::new().config(config).open_bytes(bytes).await?;

    let err = reader.select_bbox(everything()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overflow);
    assert_eq!(reader.state(), SessionState::Failed);
    Ok(())
}

/// Serves the container until `fail_from`, then reports the transport down.
struct FlakySource {
    inner: MemorySource,
    fail_from: u64,
}

impl RangeSource for FlakySource {
    async fn fetch_range(&self, offset: u64, length: usize) -> fgbstream::Result<Bytes> {
        if offset >= self.fail_from {
            return Err(FgbError::TransportUnavailable("connection reset".into()));
        }
        self.inner.fetch_range(offset, length).await
    }
}

#[tokio::test]
async fn test_transport_error_keeps_session() -> anyhow::Result<()> {
    let bytes = build_indexed(point_header(), &point_grid(6), 16)?;
    let features_offset = ReaderBuilder::new()
        .open_bytes(bytes.clone())
        .await?
        .features_offset();

    let source = FlakySource {
        inner: MemorySource::new(bytes),
        fail_from: features_offset,
    };
    let mut reader = ReaderBuilder::new().open(source).await?;

    let mut stream = reader.select_bbox(everything()).await?;
    let first = futures::StreamExt::next(&mut stream).await;
    let err = first.expect("an item").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(futures::StreamExt::next(&mut stream).await.is_none());
    assert_eq!(stream.state(), SessionState::Failed);

    // transport failures are reported per query, the session stays usable
    assert_eq!(reader.state(), SessionState::IndexReady);
    assert!(reader.scan_all().is_ok());
    Ok(())
}

#[tokio::test]
async fn test_short_container_header() {
    let mut bytes = MAGIC_BYTES.to_vec();
    bytes.extend_from_slice(&64u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 10]);
    let err = ReaderBuilder::new().open_bytes(bytes).await.unwrap_err();
    assert!(matches!(err, FgbError::Truncated { needed: 64, .. }), "{:?}", err);
}
