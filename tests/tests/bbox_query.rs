mod common;

use common::{build_indexed, drain, expected_ids, ids, init_logging, point_grid, point_header};
use fgbstream::{
    BoundingBox2D, Config, Feature, InstrumentedSource, MemorySource, ReaderBuilder,
    SessionState,
};
use fgbstream_types::{Column, ColumnType, ColumnValue, Coord, Geometry, GeometryType, Header};
use futures::TryStreamExt;
use std::io::Write;
use std::sync::Arc;

#[tokio::test]
async fn test_single_point_scenario() -> anyhow::Result<()> {
    init_logging();
    let mut header = Header::new(GeometryType::Point);
    header.columns = vec![Column::new("name", ColumnType::String)];
    let feature = Feature::new(Geometry::Point(Coord::new(1.0, 2.0))).with_property("name", "a");
    let bytes = build_indexed(header, std::slice::from_ref(&feature), 16)?;

    let mut reader = ReaderBuilder::new().open_bytes(bytes).await?;
    assert!(reader.header().is_indexed());
    let features: Vec<Feature> = reader
        .query_bbox(0.0, 0.0, 3.0, 3.0)
        .await?
        .try_collect()
        .await?;

    assert_eq!(features.len(), 1);
    assert_eq!(features[0], feature);
    let geojson = serde_json::to_value(features[0].to_geojson())?;
    assert_eq!(
        geojson["geometry"],
        serde_json::json!({"type": "Point", "coordinates": [1.0, 2.0]})
    );
    assert_eq!(geojson["properties"], serde_json::json!({"name": "a"}));
    Ok(())
}

#[tokio::test]
async fn test_query_outside_envelope_is_empty() -> anyhow::Result<()> {
    let features = point_grid(10);
    let bytes = build_indexed(point_header(), &features, 4)?;
    let mut reader = ReaderBuilder::new().open_bytes(bytes).await?;

    for rect in [
        BoundingBox2D::new(20.0, 20.0, 30.0, 30.0),
        BoundingBox2D::new(-5.0, -5.0, -0.5, -0.5),
        BoundingBox2D::new(0.2, 0.2, 0.8, 0.8),
    ] {
        let mut stream = reader.select_bbox(rect).await?;
        assert!(stream.try_next().await?.is_none());
        assert_eq!(stream.state(), SessionState::Done);
    }
    Ok(())
}

#[tokio::test]
async fn test_full_envelope_matches_scan() -> anyhow::Result<()> {
    let features = point_grid(20);
    let bytes = build_indexed(point_header(), &features, 4)?;

    for threshold in [0usize, 200, 4096, 256 * 1024] {
        let mut reader = ReaderBuilder::new()
            .extra_request_threshold(threshold)
            .open_bytes(bytes.clone())
            .await?;
        let envelope = reader.header().bounds().expect("fixture writes an envelope");

        let (queried, err) = drain(reader.select_bbox(envelope).await?).await;
        assert!(err.is_none(), "threshold {}: {:?}", threshold, err);
        let (scanned, err) = drain(reader.scan_all()?).await;
        assert!(err.is_none());

        assert_eq!(queried.len(), 400, "threshold {}", threshold);
        assert_eq!(ids(&queried), ids(&scanned));
    }
    Ok(())
}

#[tokio::test]
async fn test_windows_match_brute_force() -> anyhow::Result<()> {
    let features = point_grid(16);
    let bytes = build_indexed(point_header(), &features, 5)?;
    let mut reader = ReaderBuilder::new()
        .extra_request_threshold(512)
        .open_bytes(bytes)
        .await?;

    for rect in [
        BoundingBox2D::new(0.0, 0.0, 0.0, 0.0),
        BoundingBox2D::new(3.5, 3.5, 7.2, 5.0),
        BoundingBox2D::new(14.0, 0.0, 20.0, 2.0),
        BoundingBox2D::new(-1.0, 7.5, 16.0, 8.5),
    ] {
        let found: Vec<Feature> = reader.select_bbox(rect).await?.try_collect().await?;
        assert_eq!(ids(&found), expected_ids(&features, &rect), "{:?}", rect);
    }
    Ok(())
}

#[tokio::test]
async fn test_line_features() -> anyhow::Result<()> {
    let mut header = Header::new(GeometryType::LineString);
    header.columns = vec![Column::new("id", ColumnType::Int)];
    let features: Vec<Feature> = (0..30i32)
        .map(|i| {
            let x = i as f64 * 2.0;
            Feature::new(Geometry::LineString(vec![
                Coord::new(x, 0.0),
                Coord::new(x + 3.0, 10.0),
            ]))
            .with_property("id", i)
        })
        .collect();
    let bytes = build_indexed(header, &features, 3)?;
    let mut reader = ReaderBuilder::new().open_bytes(bytes).await?;

    let rect = BoundingBox2D::new(10.0, 4.0, 11.0, 5.0);
    let found: Vec<Feature> = reader.select_bbox(rect).await?.try_collect().await?;
    assert_eq!(ids(&found), expected_ids(&features, &rect));
    assert!(found.iter().all(|f| matches!(f.geometry, Some(Geometry::LineString(_)))));
    Ok(())
}

#[tokio::test]
async fn test_merged_reads_use_fewer_requests() -> anyhow::Result<()> {
    let features = point_grid(20);
    let bytes = build_indexed(point_header(), &features, 4)?;
    let rect = BoundingBox2D::new(2.0, 2.0, 12.0, 12.0);

    let mut requests = Vec::new();
    for threshold in [256 * 1024, 0] {
        let source = Arc::new(InstrumentedSource::new(MemorySource::new(bytes.clone())));
        let mut reader = ReaderBuilder::new()
            .config(Config::default().with_extra_request_threshold(threshold))
            .open_shared(source.clone())
            .await?;
        let found: Vec<Feature> = reader.select_bbox(rect).await?.try_collect().await?;
        assert_eq!(ids(&found), expected_ids(&features, &rect));
        requests.push(source.stats().requests);
    }
    assert!(
        requests[0] < requests[1],
        "merged {} vs unmerged {}",
        requests[0],
        requests[1]
    );
    Ok(())
}

#[tokio::test]
async fn test_query_from_file() -> anyhow::Result<()> {
    let features = point_grid(8);
    let bytes = build_indexed(point_header(), &features, 16)?;
    let mut tmp = tempfile::NamedTempFile::new()?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;

    let mut reader = ReaderBuilder::new().open_file(tmp.path()).await?;
    let rect = BoundingBox2D::new(1.0, 1.0, 2.0, 2.0);
    let found: Vec<Feature> = reader.select_bbox(rect).await?.try_collect().await?;
    assert_eq!(ids(&found), vec![9, 10, 17, 18]);
    assert_eq!(found[0].properties["name"].column_type(), ColumnType::String);
    assert!(matches!(found[0].properties["id"], ColumnValue::Int(_)));
    Ok(())
}

#[tokio::test]
async fn test_final_feature_longer_than_guess() -> anyhow::Result<()> {
    let mut features = point_grid(4);
    let long_name = "n".repeat(2000);
    if let Some(last) = features.last_mut() {
        last.properties
            .insert("name".into(), ColumnValue::from(long_name.as_str()));
    }
    let bytes = build_indexed(point_header(), &features, 4)?;
    let mut reader = ReaderBuilder::new()
        .extra_request_threshold(64)
        .open_bytes(bytes)
        .await?;

    let rect = BoundingBox2D::new(2.5, 2.5, 3.0, 3.0);
    let found: Vec<Feature> = reader.select_bbox(rect).await?.try_collect().await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], features[15]);
    assert_eq!(
        found[0].properties["name"],
        ColumnValue::from(long_name.as_str())
    );

    let everything: Vec<Feature> = reader
        .query_bbox(0.0, 0.0, 3.0, 3.0)
        .await?
        .try_collect()
        .await?;
    assert_eq!(ids(&everything), (0..16).collect::<Vec<i32>>());
    Ok(())
}
