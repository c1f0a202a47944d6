//! Container fixtures with a packed index.
#![allow(dead_code)]

use fgbstream::codec::{MAGIC_BYTES, encode_feature, encode_header};
use fgbstream::index::{NODE_ITEM_LEN, NodeItem, generate_level_bounds};
use fgbstream::{BoundingBox2D, Feature, FgbError};
use fgbstream_types::{Column, ColumnType, Coord, Geometry, GeometryType, Header};
use futures::StreamExt;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn point_header() -> Header {
    let mut header = Header::new(GeometryType::Point);
    header.name = Some("points".into());
    header.columns = vec![
        Column::new("id", ColumnType::Int),
        Column::new("name", ColumnType::String),
    ];
    header
}

/// `side * side` points at integer coordinates, in row order.
pub fn point_grid(side: usize) -> Vec<Feature> {
    (0..side * side)
        .map(|i| {
            let (x, y) = ((i % side) as f64, (i / side) as f64);
            Feature::new(Geometry::Point(Coord::new(x, y)))
                .with_property("id", i as i32)
                .with_property("name", format!("p{}", i))
        })
        .collect()
}

/// Write a container whose index packs `features` in the given order.
///
/// Every feature needs a non-empty geometry. Parent nodes cover their
/// children; leaf offsets point at the length-prefixed records.
pub fn build_indexed(
    mut header: Header,
    features: &[Feature],
    node_size: u16,
) -> anyhow::Result<Vec<u8>> {
    let mut records = Vec::new();
    let mut leaves = Vec::with_capacity(features.len());
    for feature in features {
        let bounds = feature
            .bounds()
            .ok_or_else(|| anyhow::anyhow!("fixture features need a geometry"))?;
        leaves.push(NodeItem {
            min_x: bounds.min_x(),
            min_y: bounds.min_y(),
            max_x: bounds.max_x(),
            max_y: bounds.max_y(),
            offset: records.len() as u64,
        });
        let record = encode_feature(feature, &header.columns)?;
        records.extend_from_slice(&(record.len() as u32).to_le_bytes());
        records.extend_from_slice(&record);
    }

    let tree = pack_tree(&leaves, node_size)?;
    if let Some(envelope) = leaves
        .iter()
        .map(NodeItem::bounds)
        .reduce(|a, b| a.union(&b))
    {
        header.envelope = Some(vec![
            envelope.min_x(),
            envelope.min_y(),
            envelope.max_x(),
            envelope.max_y(),
        ]);
    }
    header.features_count = features.len() as u64;
    header.index_node_size = node_size;

    let header_bytes = encode_header(&header);
    let mut out = MAGIC_BYTES.to_vec();
    out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&tree);
    out.extend_from_slice(&records);
    Ok(out)
}

fn pack_tree(leaves: &[NodeItem], node_size: u16) -> anyhow::Result<Vec<u8>> {
    if leaves.is_empty() {
        return Ok(Vec::new());
    }
    let bounds = generate_level_bounds(leaves.len() as u64, node_size)?;
    let mut nodes = vec![leaves[0]; bounds[0].end];
    nodes[bounds[0].clone()].copy_from_slice(leaves);

    let b = usize::from(node_size);
    for level in 1..bounds.len() {
        let children = bounds[level - 1].clone();
        for (k, pos) in bounds[level].clone().enumerate() {
            let first = children.start + k * b;
            let last = (first + b).min(children.end);
            let mut node = nodes[first];
            for child in &nodes[first + 1..last] {
                node.min_x = node.min_x.min(child.min_x);
                node.min_y = node.min_y.min(child.min_y);
                node.max_x = node.max_x.max(child.max_x);
                node.max_y = node.max_y.max(child.max_y);
            }
            node.offset = first as u64;
            nodes[pos] = node;
        }
    }

    let mut out = Vec::with_capacity(nodes.len() * NODE_ITEM_LEN);
    for node in &nodes {
        node.write(&mut out);
    }
    Ok(out)
}

/// Drain a feature stream, returning the features seen before the first
/// error and that error.
pub async fn drain(
    mut stream: fgbstream::FeatureStream,
) -> (Vec<Feature>, Option<FgbError>) {
    let mut features = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(feature) => features.push(feature),
            Err(e) => return (features, Some(e)),
        }
    }
    (features, None)
}

/// Sorted `id` property values, for order-independent comparisons.
pub fn ids(features: &[Feature]) -> Vec<i32> {
    let mut ids: Vec<i32> = features
        .iter()
        .filter_map(|f| match f.properties.get("id") {
            Some(fgbstream_types::ColumnValue::Int(id)) => Some(*id),
            _ => None,
        })
        .collect();
    ids.sort_unstable();
    ids
}

/// Ids of the features whose bounds intersect `rect`, computed directly.
pub fn expected_ids(features: &[Feature], rect: &BoundingBox2D) -> Vec<i32> {
    let hits: Vec<Feature> = features
        .iter()
        .filter(|f| f.bounds().is_some_and(|b| b.intersects(rect)))
        .cloned()
        .collect();
    ids(&hits)
}
