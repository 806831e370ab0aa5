use std::sync::mpsc;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::{Geometry, Point, Rectangle, Shape};
use crate::rtree::decode::{copy_payload, utf8_payload};
use crate::rtree::{
    Cancellable, CancellationToken, Entry, RTreeIndex, RTreeWriter, SearchStatus,
    SerializedRTree, SerializedRTreeRef,
};
use crate::test::pack_tree;
use crate::CoordType;

fn random_geometry(rng: &mut StdRng) -> Geometry<f64> {
    let x = rng.gen_range(0.0..1000.0);
    let y = rng.gen_range(0.0..1000.0);
    if rng.gen_bool(0.5) {
        Point::new(x, y).into()
    } else {
        let w = rng.gen_range(0.0..25.0);
        let h = rng.gen_range(0.0..25.0);
        Rectangle::new(x, y, x + w, y + h).into()
    }
}

/// Random items whose payload is their index, packed after sorting by x so that leaves are
/// vertical strips.
fn random_tree(
    rng: &mut StdRng,
    count: usize,
    node_size: usize,
) -> (Vec<(Geometry<f64>, Vec<u8>)>, SerializedRTree<f64>) {
    let mut items = (0..count)
        .map(|i| (random_geometry(rng), i.to_string().into_bytes()))
        .collect::<Vec<_>>();
    items.sort_by(|a, b| a.0.mbr().min_x.total_cmp(&b.0.mbr().min_x));
    let (tree, _) = pack_tree(&items, node_size);
    (items, tree)
}

fn sorted_values(entries: Vec<Entry<String, f64>>) -> Vec<String> {
    let mut values = entries
        .into_iter()
        .map(|e| e.into_parts().0)
        .collect::<Vec<_>>();
    values.sort();
    values
}

fn brute_force(items: &[(Geometry<f64>, Vec<u8>)], query: &Rectangle<f64>) -> Vec<String> {
    let mut values = items
        .iter()
        .filter(|(g, _)| g.intersects(query))
        .map(|(_, payload)| String::from_utf8(payload.clone()).unwrap())
        .collect::<Vec<_>>();
    values.sort();
    values
}

#[test]
fn matches_brute_force_on_random_trees() {
    let mut rng = StdRng::seed_from_u64(7);
    for (count, node_size) in [(1, 4), (37, 2), (500, 8), (2000, 16)] {
        let (items, tree) = random_tree(&mut rng, count, node_size);
        for _ in 0..50 {
            let x = rng.gen_range(-50.0..1000.0);
            let y = rng.gen_range(-50.0..1000.0);
            let query = Rectangle::new(x, y, x + rng.gen_range(0.0..200.0), y + 100.0);

            let results = tree.search_rect(&query, utf8_payload).unwrap();
            assert_eq!(sorted_values(results), brute_force(&items, &query));
        }
    }
}

#[test]
fn every_entry_is_reachable() {
    let mut rng = StdRng::seed_from_u64(11);
    let (items, tree) = random_tree(&mut rng, 300, 5);
    let mut results = vec![];
    let stats = tree
        .search(|_: &Geometry<f64>| true, &mut results, copy_payload)
        .unwrap();
    assert!(stats.is_complete());
    assert_eq!(stats.results, items.len());
    assert_eq!(stats.nodes_pruned, 0);
}

#[test]
fn node_walk_matches_search() {
    let mut rng = StdRng::seed_from_u64(3);
    let (items, tree) = random_tree(&mut rng, 120, 4);
    let deserializer = utf8_payload;

    let mut pending = vec![tree.root(&deserializer).unwrap()];
    let mut values = vec![];
    while let Some(node) = pending.pop() {
        for child in node.children().unwrap() {
            assert!(node.geometry().contains(&child.geometry()));
            match child.as_leaf() {
                Some(leaf) => values.extend(leaf.entries().iter().map(|e| e.value().clone())),
                None => pending.extend(child.as_non_leaf().copied()),
            }
        }
    }
    values.sort();

    let everything = Rectangle::new(-100.0, -100.0, 2000.0, 2000.0);
    assert!(tree.root(&deserializer).unwrap().count() > 1);
    assert_eq!(values, brute_force(&items, &everything));
}

#[test]
fn concurrent_searches_share_one_buffer() {
    let mut rng = StdRng::seed_from_u64(5);
    let (items, tree) = random_tree(&mut rng, 1000, 10);
    let tree_ref = SerializedRTreeRef::<f64>::try_new(&tree).unwrap();
    let queries = (0..8)
        .map(|i| {
            let x = i as f64 * 120.0;
            Rectangle::new(x, 0.0, x + 150.0, 1000.0)
        })
        .collect::<Vec<_>>();

    thread::scope(|s| {
        let handles = queries
            .iter()
            .map(|query| s.spawn(move || tree_ref.search_rect(query, utf8_payload).unwrap()))
            .collect::<Vec<_>>();
        for (handle, query) in handles.into_iter().zip(&queries) {
            let results = handle.join().unwrap();
            assert_eq!(sorted_values(results), brute_force(&items, query));
        }
    });
}

#[test]
fn cancel_from_another_thread() {
    let (tree, _) = crate::test::grid_tree(20, 6);
    let token = CancellationToken::new();
    let (request_tx, request_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            request_rx.recv().unwrap();
            token.cancel();
            done_tx.send(()).unwrap();
        })
    };

    let mut sink = Cancellable::new(vec![], token);
    let mut calls = 0;
    let stats = tree
        .search(
            |_: &Geometry<f64>| true,
            &mut sink,
            |bytes: &[u8]| {
                calls += 1;
                if calls == 10 {
                    request_tx.send(()).unwrap();
                    done_rx.recv().unwrap();
                }
                copy_payload(bytes)
            },
        )
        .unwrap();
    canceller.join().unwrap();

    assert_eq!(stats.status, SearchStatus::Canceled);
    assert_eq!(sink.into_inner().len(), 10);
}

#[test]
fn coord_type_of_every_scalar() {
    fn written<N: crate::IndexableNum>(x: N) -> SerializedRTree<N> {
        let mut writer = RTreeWriter::<N>::new();
        let leaf = writer
            .add_leaf([(Point::new(x, x).into(), &[][..])])
            .unwrap();
        writer.finish(leaf).unwrap()
    }

    assert_eq!(CoordType::from_buffer(&written(1i8)).unwrap(), CoordType::Int8);
    assert_eq!(CoordType::from_buffer(&written(1u8)).unwrap(), CoordType::UInt8);
    assert_eq!(CoordType::from_buffer(&written(1i16)).unwrap(), CoordType::Int16);
    assert_eq!(CoordType::from_buffer(&written(1u16)).unwrap(), CoordType::UInt16);
    assert_eq!(CoordType::from_buffer(&written(1i32)).unwrap(), CoordType::Int32);
    assert_eq!(CoordType::from_buffer(&written(1u32)).unwrap(), CoordType::UInt32);
    assert_eq!(CoordType::from_buffer(&written(1f32)).unwrap(), CoordType::Float32);
    assert_eq!(CoordType::from_buffer(&written(1f64)).unwrap(), CoordType::Float64);
}

#[test]
fn reopened_buffer_gives_same_answers() {
    let mut rng = StdRng::seed_from_u64(9);
    let (_, tree) = random_tree(&mut rng, 200, 6);
    let query = Rectangle::new(100.0, 100.0, 600.0, 400.0);
    let before = sorted_values(tree.search_rect(&query, utf8_payload).unwrap());

    let height = tree.height();
    let reopened = SerializedRTree::<f64>::try_new(tree.into_inner()).unwrap();
    assert_eq!(reopened.height(), height);
    assert_eq!(
        sorted_values(reopened.search_rect(&query, utf8_payload).unwrap()),
        before
    );
}
