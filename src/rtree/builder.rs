use std::collections::HashMap;

use bytemuck::bytes_of;
use log::debug;

use crate::error::{RTreeError, Result};
use crate::geometry::{Geometry, Rectangle, Shape};
use crate::r#type::IndexableNum;
use crate::rtree::constants::{HEADER_BYTE_LENGTH, MAX_HEIGHT, RTREE_MAGIC, VERSION};
use crate::rtree::cursor::GeometryType;
use crate::rtree::index::{RTreeMetadata, SerializedRTree};

/// Lays out a tree whose shape is chosen by the caller.
///
/// Nodes are written bottom-up: entries and leaves first, then the parents that reference them,
/// and finally the root is named in [`RTreeWriter::finish`]. The writer decides nothing about
/// which entries share a leaf or which nodes share a parent.
///
/// ```
/// use frozen_rtree::geometry::{Point, Rectangle};
/// use frozen_rtree::rtree::{RTreeIndex, RTreeWriter};
///
/// let mut writer = RTreeWriter::<f64>::new();
/// let a = writer.add_leaf([(Point::new(1., 1.).into(), &b"A"[..])]).unwrap();
/// let b = writer.add_leaf([(Point::new(99., 99.).into(), &b"B"[..])]).unwrap();
/// let root = writer.add_parent(&[a, b]).unwrap();
/// let tree = writer.finish(root).unwrap();
///
/// let hits = tree
///     .search_rect(&Rectangle::new(0., 0., 10., 10.), frozen_rtree::rtree::decode::utf8_payload)
///     .unwrap();
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].value(), "A");
/// ```
#[derive(Debug)]
pub struct RTreeWriter<N: IndexableNum> {
    /// data buffer, header included
    data: Vec<u8>,
    /// Bounding box and height of every node written so far, by offset
    nodes: HashMap<usize, (Rectangle<N>, u16)>,
}

impl<N: IndexableNum> Default for RTreeWriter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: IndexableNum> RTreeWriter<N> {
    pub fn new() -> Self {
        Self {
            data: vec![0; HEADER_BYTE_LENGTH],
            nodes: HashMap::new(),
        }
    }

    /// Write a leaf holding `entries` and return its offset.
    ///
    /// The leaf's bounding box is the union of the entries' bounding rectangles.
    pub fn add_leaf<'p>(
        &mut self,
        entries: impl IntoIterator<Item = (Geometry<N>, &'p [u8])>,
    ) -> Result<usize> {
        let mut offsets = vec![];
        let mut mbb: Option<Rectangle<N>> = None;
        for (geometry, payload) in entries {
            offsets.push(self.write_entry(&geometry, payload)?);
            let rect = geometry.mbr();
            mbb = Some(mbb.map_or(rect, |m| m.union(&rect)));
        }
        let mbb = mbb.ok_or_else(|| {
            RTreeError::General("A leaf needs at least one entry.".to_string())
        })?;
        self.write_node(mbb, &[], &offsets, 1)
    }

    /// Write a node whose children are the already written nodes at `children`, and return its
    /// offset. Its bounding box is the union of the children's boxes.
    pub fn add_parent(&mut self, children: &[usize]) -> Result<usize> {
        let mut mbb: Option<Rectangle<N>> = None;
        for child in children {
            let (rect, _) = self.lookup(*child)?;
            mbb = Some(mbb.map_or(rect, |m| m.union(&rect)));
        }
        let mbb = mbb.ok_or_else(|| {
            RTreeError::General("A parent node needs at least one child.".to_string())
        })?;
        self.add_parent_with_mbb(children, mbb)
    }

    /// Like [`RTreeWriter::add_parent`], with an explicit bounding box. `mbb` must contain the
    /// bounding box of every child, so that searches never prune a subtree they need.
    ///
    /// Fails if the new node would make the tree taller than [`MAX_HEIGHT`].
    pub fn add_parent_with_mbb(&mut self, children: &[usize], mbb: Rectangle<N>) -> Result<usize> {
        if children.is_empty() {
            return Err(RTreeError::General(
                "A parent node needs at least one child.".to_string(),
            ));
        }
        let mut height = 0;
        for child in children {
            let (rect, child_height) = self.lookup(*child)?;
            if !mbb.contains(&rect) {
                return Err(RTreeError::General(format!(
                    "Bounding box {} does not contain child at offset {}.",
                    mbb, child
                )));
            }
            height = height.max(child_height);
        }
        let height = height + 1;
        if height > MAX_HEIGHT {
            return Err(RTreeError::General(format!(
                "Tree height {} exceeds the maximum of {}.",
                height, MAX_HEIGHT
            )));
        }
        self.write_node(mbb, children, &[], height)
    }

    /// Write the header naming `root` and return the finished tree.
    pub fn finish(mut self, root: usize) -> Result<SerializedRTree<N>> {
        let (_, height) = self.lookup(root)?;
        let root_offset = to_offset(root)?;

        self.data[0] = RTREE_MAGIC;
        self.data[1] = (VERSION << 4) + N::TYPE_INDEX;
        self.data[2..4].copy_from_slice(bytes_of(&height));
        self.data[4..8].copy_from_slice(bytes_of(&root_offset));

        debug!(
            "wrote tree of {} bytes, height {}, root at offset {}",
            self.data.len(),
            height,
            root
        );

        let metadata = RTreeMetadata::try_new(&self.data)?;
        Ok(SerializedRTree::from_parts(self.data, metadata))
    }

    fn lookup(&self, offset: usize) -> Result<(Rectangle<N>, u16)> {
        self.nodes.get(&offset).copied().ok_or_else(|| {
            RTreeError::General(format!("No node was written at offset {}.", offset))
        })
    }

    fn write_entry(&mut self, geometry: &Geometry<N>, payload: &[u8]) -> Result<u32> {
        let offset = to_offset(self.data.len())?;
        let payload_len = u32::try_from(payload.len()).map_err(|_| {
            RTreeError::General(format!("Payload of {} bytes is too large.", payload.len()))
        })?;
        match geometry {
            Geometry::Rectangle(rect) => {
                self.data.push(GeometryType::Box.tag());
                self.push_box(rect);
            }
            Geometry::Point(point) => {
                self.data.push(GeometryType::Point.tag());
                self.data.extend_from_slice(bytes_of(&point.x));
                self.data.extend_from_slice(bytes_of(&point.y));
            }
        }
        self.data.extend_from_slice(bytes_of(&payload_len));
        self.data.extend_from_slice(payload);
        Ok(offset)
    }

    fn write_node(
        &mut self,
        mbb: Rectangle<N>,
        children: &[usize],
        entries: &[u32],
        height: u16,
    ) -> Result<usize> {
        let offset = self.data.len();
        to_offset(offset)?;
        let children_len = to_offset(children.len())?;
        let entries_len = to_offset(entries.len())?;

        self.push_box(&mbb);
        self.data.extend_from_slice(bytes_of(&children_len));
        self.data.extend_from_slice(bytes_of(&entries_len));
        for child in children {
            self.data.extend_from_slice(bytes_of(&to_offset(*child)?));
        }
        for entry in entries {
            self.data.extend_from_slice(bytes_of(entry));
        }

        self.nodes.insert(offset, (mbb, height));
        Ok(offset)
    }

    fn push_box(&mut self, rect: &Rectangle<N>) {
        self.data.extend_from_slice(bytes_of(&rect.min_x));
        self.data.extend_from_slice(bytes_of(&rect.min_y));
        self.data.extend_from_slice(bytes_of(&rect.max_x));
        self.data.extend_from_slice(bytes_of(&rect.max_y));
    }
}

fn to_offset(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        RTreeError::General(format!("Offset {} does not fit the 32-bit format.", value))
    })
}
