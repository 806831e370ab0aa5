use bytemuck::bytes_of;

use crate::geometry::{Geometry, Point, Rectangle};
use crate::r#type::IndexableNum;
use crate::rtree::cursor::box_byte_length;
use crate::rtree::{RTreeWriter, SerializedRTree};

mod integration;

/// A root with bounding box (0, 0, 100, 100) over two single-entry leaves: "A" at (1, 1) and
/// "B" at (99, 99).
pub(crate) fn two_leaf_tree() -> (SerializedRTree<f64>, usize) {
    let mut writer = RTreeWriter::new();
    let a = writer
        .add_leaf([(Point::new(1.0, 1.0).into(), &b"A"[..])])
        .unwrap();
    let b = writer
        .add_leaf([(Point::new(99.0, 99.0).into(), &b"B"[..])])
        .unwrap();
    let root = writer
        .add_parent_with_mbb(&[a, b], Rectangle::new(0.0, 0.0, 100.0, 100.0))
        .unwrap();
    (writer.finish(root).unwrap(), root)
}

/// Points on the `n` by `n` integer grid, with payload `"x,y"`, packed `node_size` per node.
pub(crate) fn grid_tree(n: usize, node_size: usize) -> (SerializedRTree<f64>, usize) {
    let mut items = vec![];
    for y in 0..n {
        for x in 0..n {
            let point = Point::new(x as f64, y as f64);
            items.push((point.into(), format!("{},{}", x, y).into_bytes()));
        }
    }
    pack_tree(&items, node_size)
}

/// Pack `items` in the given order: consecutive runs of `node_size` items form a leaf, and
/// consecutive runs of `node_size` nodes form a parent, up to a single root.
pub(crate) fn pack_tree<N: IndexableNum>(
    items: &[(Geometry<N>, Vec<u8>)],
    node_size: usize,
) -> (SerializedRTree<N>, usize) {
    assert!(!items.is_empty() && node_size > 1);
    let mut writer = RTreeWriter::new();
    let mut level = items
        .chunks(node_size)
        .map(|chunk| {
            writer
                .add_leaf(chunk.iter().map(|(g, payload)| (*g, payload.as_slice())))
                .unwrap()
        })
        .collect::<Vec<_>>();
    while level.len() > 1 {
        level = level
            .chunks(node_size)
            .map(|chunk| writer.add_parent(chunk).unwrap())
            .collect();
    }
    let root = level[0];
    (writer.finish(root).unwrap(), root)
}

/// Overwrite the entries count of the node record at `node_offset`.
pub(crate) fn set_entries_count<N: IndexableNum>(
    buffer: &mut [u8],
    node_offset: usize,
    count: u32,
) {
    let pos = node_offset + box_byte_length::<N>() + 4;
    buffer[pos..pos + 4].copy_from_slice(bytes_of(&count));
}
