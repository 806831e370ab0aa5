use std::convert::Infallible;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use frozen_rtree::geometry::{Geometry, Rectangle, Shape};
use frozen_rtree::rtree::{Limit, RTreeIndex, RTreeWriter, SerializedRTree};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstar::primitives::Rectangle as RStarRectangle;
use rstar::{RTree, AABB};

const NODE_SIZE: usize = 16;

fn random_boxes(count: usize) -> Vec<Rectangle<f64>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let x = rng.gen_range(0.0..10_000.0);
            let y = rng.gen_range(0.0..10_000.0);
            Rectangle::new(x, y, x + rng.gen_range(0.0..20.0), y + rng.gen_range(0.0..20.0))
        })
        .collect()
}

/// Sort-tile packing: vertical slices by x, then runs of `NODE_SIZE` by y inside each slice.
fn construct_tree(boxes: &[Rectangle<f64>]) -> SerializedRTree<f64> {
    let mut items = boxes
        .iter()
        .enumerate()
        .map(|(i, rect)| (*rect, (i as u32).to_ne_bytes()))
        .collect::<Vec<_>>();
    let leaves = items.len().div_ceil(NODE_SIZE);
    let slice_len = (leaves as f64).sqrt().ceil() as usize * NODE_SIZE;
    items.sort_by(|a, b| a.0.min_x.total_cmp(&b.0.min_x));
    for slice in items.chunks_mut(slice_len) {
        slice.sort_by(|a, b| a.0.min_y.total_cmp(&b.0.min_y));
    }

    let mut writer = RTreeWriter::new();
    let mut level = items
        .chunks(NODE_SIZE)
        .map(|chunk| {
            writer
                .add_leaf(
                    chunk
                        .iter()
                        .map(|(rect, id)| (Geometry::Rectangle(*rect), &id[..])),
                )
                .unwrap()
        })
        .collect::<Vec<_>>();
    while level.len() > 1 {
        level = level
            .chunks(NODE_SIZE)
            .map(|chunk| writer.add_parent(chunk).unwrap())
            .collect();
    }
    writer.finish(level[0]).unwrap()
}

fn read_id(bytes: &[u8]) -> Result<u32, Infallible> {
    let mut id = [0; 4];
    id.copy_from_slice(bytes);
    Ok(u32::from_ne_bytes(id))
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let boxes = random_boxes(100_000);
    let tree = construct_tree(&boxes);
    let rstar_tree: RTree<RStarRectangle<(f64, f64)>> = RTree::bulk_load(
        boxes
            .iter()
            .map(|r| RStarRectangle::from_corners((r.min_x, r.min_y), (r.max_x, r.max_y)))
            .collect(),
    );
    let query = Rectangle::new(4_000.0, 4_000.0, 4_300.0, 4_200.0);

    c.bench_function("construction (writer)", |b| {
        b.iter(|| construct_tree(black_box(&boxes)))
    });

    c.bench_function("search (serialized)", |b| {
        b.iter(|| tree.search_rect(black_box(&query), read_id).unwrap())
    });

    c.bench_function("search (serialized, first 10)", |b| {
        b.iter(|| {
            let mut sink = Limit::new(Vec::with_capacity(10), 10);
            tree.search(
                |g: &Geometry<f64>| g.intersects(&query),
                &mut sink,
                read_id,
            )
            .unwrap();
            sink.into_inner()
        })
    });

    c.bench_function("search (brute force)", |b| {
        b.iter(|| {
            boxes
                .iter()
                .enumerate()
                .filter(|(_, r)| r.intersects(black_box(&query)))
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        })
    });

    c.bench_function("search (rstar)", |b| {
        b.iter(|| {
            let aabb = AABB::from_corners((query.min_x, query.min_y), (query.max_x, query.max_y));
            rstar_tree
                .locate_in_envelope_intersecting(&aabb)
                .count()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
