use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fgbstream::index::{NODE_ITEM_LEN, NodeItem, generate_level_bounds, stream_search};
use fgbstream::{BoundingBox2D, Config};
use futures::TryStreamExt;
use std::hint::black_box;

/// Pack `side * side` unit cells laid out in row order.
fn grid_index(side: usize, node_size: u16) -> Bytes {
    let n = side * side;
    let bounds = generate_level_bounds(n as u64, node_size).unwrap();
    let mut nodes = vec![
        NodeItem {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
            offset: 0,
        };
        bounds[0].end
    ];
    for i in 0..n {
        let (x, y) = ((i % side) as f64, (i / side) as f64);
        nodes[bounds[0].start + i] = NodeItem {
            min_x: x,
            min_y: y,
            max_x: x + 1.0,
            max_y: y + 1.0,
            offset: i as u64 * 64,
        };
    }
    let b = usize::from(node_size);
    for level in 1..bounds.len() {
        let children = bounds[level - 1].clone();
        for (k, pos) in bounds[level].clone().enumerate() {
            let first = children.start + k * b;
            let last = (first + b).min(children.end);
            let mut node = nodes[pos];
            for child in &nodes[first..last] {
                node.min_x = node.min_x.min(child.min_x);
                node.min_y = node.min_y.min(child.min_y);
                node.max_x = node.max_x.max(child.max_x);
                node.max_y = node.max_y.max(child.max_y);
            }
            node.offset = first as u64;
            nodes[pos] = node;
        }
    }
    let mut buf = Vec::with_capacity(nodes.len() * NODE_ITEM_LEN);
    for node in &nodes {
        node.write(&mut buf);
    }
    Bytes::from(buf)
}

fn bench_search(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("index_search");

    for side in [100usize, 300, 1000] {
        let index = grid_index(side, 16);
        let n = (side * side) as u64;
        let window = BoundingBox2D::new(10.5, 10.5, 30.5, 30.5);
        group.throughput(Throughput::Elements(n));

        for (label, threshold) in [("merged", 256 * 1024), ("unmerged", 0)] {
            let config = Config::default().with_extra_request_threshold(threshold);
            group.bench_with_input(BenchmarkId::new(label, n), &index, |b, index| {
                b.iter(|| {
                    rt.block_on(async {
                        let hits: Vec<_> =
                            stream_search(n, 16, window, &config, index.clone())
                                .unwrap()
                                .try_collect()
                                .await
                                .unwrap();
                        black_box(hits.len())
                    })
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
