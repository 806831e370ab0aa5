//! Node-level access to a serialized tree.
//!
//! [`NodeRef`] is a lazy view that reads from the buffer on demand. Leaves reached through it are
//! materialized into [`Leaf`] values that own their decoded entries.

use std::fmt;

use crate::error::{BoxError, RTreeError, Result};
use crate::geometry::{Geometry, Rectangle};
use crate::r#type::IndexableNum;
use crate::rtree::cursor::{BoxCursor, EntryCursor, GeometryCursor, NodeCursor};
use crate::rtree::decode::{decode_geometry, decode_payload};
use crate::rtree::entry::Entry;
use crate::rtree::sink::{SearchOptions, SearchStats, Sink};
use crate::rtree::traversal;

/// Read-only access shared by every representation of a node.
pub trait RTreeNode<N: IndexableNum> {
    /// The minimum bounding box of everything under this node.
    fn mbb(&self) -> Rectangle<N>;

    fn children_count(&self) -> usize;

    fn entries_count(&self) -> usize;

    fn is_leaf(&self) -> bool {
        self.children_count() == 0
    }

    /// The number of children of a non-leaf node, or the number of entries of a leaf.
    fn count(&self) -> usize {
        if self.is_leaf() {
            self.entries_count()
        } else {
            self.children_count()
        }
    }
}

impl<N: IndexableNum> RTreeNode<N> for NodeCursor<'_, N> {
    fn mbb(&self) -> Rectangle<N> {
        self.mbb_rect()
    }

    fn children_count(&self) -> usize {
        NodeCursor::children_count(self)
    }

    fn entries_count(&self) -> usize {
        NodeCursor::entries_count(self)
    }
}

fn fmt_node<N: IndexableNum>(
    f: &mut fmt::Formatter<'_>,
    leaf: bool,
    mbb: &Rectangle<N>,
) -> fmt::Result {
    let kind = if leaf { "Leaf" } else { "NonLeaf" };
    write!(f, "Node [{},{}]", kind, mbb)
}

/// A node read lazily from the buffer.
///
/// The deserializer is borrowed and used whenever a leaf below this node is materialized.
pub struct NodeRef<'a, N: IndexableNum, D> {
    cursor: NodeCursor<'a, N>,
    deserializer: &'a D,
}

impl<N: IndexableNum, D> Clone for NodeRef<'_, N, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N: IndexableNum, D> Copy for NodeRef<'_, N, D> {}

impl<N: IndexableNum, D> fmt::Debug for NodeRef<'_, N, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl<'a, N: IndexableNum, D> NodeRef<'a, N, D> {
    /// View the node record at `offset`, failing if it is malformed or out of bounds.
    pub fn try_new(data: &'a [u8], offset: usize, deserializer: &'a D) -> Result<Self> {
        Ok(Self {
            cursor: NodeCursor::at(data, offset)?,
            deserializer,
        })
    }

    pub fn offset(&self) -> usize {
        self.cursor.offset()
    }

    pub fn cursor(&self) -> &NodeCursor<'a, N> {
        &self.cursor
    }

    /// The number of children, or of entries for a leaf.
    pub fn count(&self) -> usize {
        RTreeNode::count(self)
    }

    pub fn geometry(&self) -> Rectangle<N> {
        self.cursor.mbb_rect()
    }

    /// Always fails: a serialized tree cannot be modified.
    pub fn add<T>(&mut self, _entry: Entry<T, N>) -> Result<()> {
        Err(RTreeError::UnsupportedMutation)
    }

    /// Always fails: a serialized tree cannot be modified.
    pub fn delete<T>(&mut self, _entry: &Entry<T, N>, _all: bool) -> Result<usize> {
        Err(RTreeError::UnsupportedMutation)
    }
}

impl<'a, N, D> NodeRef<'a, N, D>
where
    N: IndexableNum,
{
    /// Every child of this node. Children that hold entries come back as [`Node::Leaf`] with all
    /// of their entries decoded; the others stay lazy.
    pub fn children<T, E>(&self) -> Result<Vec<Node<'a, T, N, D>>>
    where
        D: Fn(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        let mut cursor = NodeCursor::new(self.cursor.data());
        let mut children = Vec::with_capacity(self.cursor.children_count());
        for i in 0..self.cursor.children_count() {
            self.cursor.child(i, &mut cursor)?;
            children.push(self.materialize(cursor)?);
        }
        Ok(children)
    }

    /// The `i`th child of this node, materialized like [`NodeRef::children`].
    pub fn child<T, E>(&self, i: usize) -> Result<Node<'a, T, N, D>>
    where
        D: Fn(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        let mut cursor = NodeCursor::new(self.cursor.data());
        self.cursor.child(i, &mut cursor)?;
        self.materialize(cursor)
    }

    /// Decode the entries of this node. Empty unless this node is a leaf.
    pub fn entries<T, E>(&self) -> Result<Vec<Entry<T, N>>>
    where
        D: Fn(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        read_entries(&self.cursor, self.deserializer)
    }

    /// Run a search from this node, deserializing with this node's deserializer.
    pub fn search<T, E, C, S>(&self, criterion: C, sink: &mut S) -> Result<SearchStats>
    where
        D: Fn(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
        C: FnMut(&Geometry<N>) -> bool,
        S: Sink<T, N> + ?Sized,
    {
        traversal::search(
            self.cursor.data(),
            self.cursor.offset(),
            criterion,
            sink,
            self.deserializer,
            &SearchOptions::default(),
        )
    }

    fn materialize<T, E>(&self, cursor: NodeCursor<'a, N>) -> Result<Node<'a, T, N, D>>
    where
        D: Fn(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        if cursor.is_leaf() {
            Ok(Node::Leaf(Leaf {
                mbr: cursor.mbb_rect(),
                entries: read_entries(&cursor, self.deserializer)?,
            }))
        } else {
            Ok(Node::NonLeaf(NodeRef {
                cursor,
                deserializer: self.deserializer,
            }))
        }
    }
}

impl<N: IndexableNum, D> RTreeNode<N> for NodeRef<'_, N, D> {
    fn mbb(&self) -> Rectangle<N> {
        self.cursor.mbb_rect()
    }

    fn children_count(&self) -> usize {
        self.cursor.children_count()
    }

    fn entries_count(&self) -> usize {
        self.cursor.entries_count()
    }
}

impl<N: IndexableNum, D> fmt::Display for NodeRef<'_, N, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(f, self.cursor.is_leaf(), &self.cursor.mbb_rect())
    }
}

fn read_entries<T, E, N, D>(
    node: &NodeCursor<'_, N>,
    deserializer: &D,
) -> Result<Vec<Entry<T, N>>>
where
    N: IndexableNum,
    D: Fn(&[u8]) -> std::result::Result<T, E>,
    E: Into<BoxError>,
{
    let data = node.data();
    let mut entry = EntryCursor::new(data);
    let mut geometry = GeometryCursor::new(data);
    let mut bbox = BoxCursor::new(data);

    let mut entries = Vec::with_capacity(node.entries_count());
    for i in 0..node.entries_count() {
        node.entry(i, &mut entry)?;
        entry.geometry(&mut geometry)?;
        let decoded = decode_geometry(&geometry, &mut bbox);
        let value = deserializer(decode_payload(&entry)).map_err(|err| {
            RTreeError::Deserialization {
                offset: entry.offset(),
                source: err.into(),
            }
        })?;
        entries.push(Entry::new(value, decoded));
    }
    Ok(entries)
}

/// A leaf with every entry decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf<T, N: IndexableNum> {
    mbr: Rectangle<N>,
    entries: Vec<Entry<T, N>>,
}

impl<T, N: IndexableNum> Leaf<T, N> {
    pub fn new(mbr: Rectangle<N>, entries: Vec<Entry<T, N>>) -> Self {
        Self { mbr, entries }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn geometry(&self) -> Rectangle<N> {
        self.mbr
    }

    pub fn entries(&self) -> &[Entry<T, N>] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry<T, N>> {
        self.entries
    }
}

impl<T, N: IndexableNum> RTreeNode<N> for Leaf<T, N> {
    fn mbb(&self) -> Rectangle<N> {
        self.mbr
    }

    fn children_count(&self) -> usize {
        0
    }

    fn entries_count(&self) -> usize {
        self.entries.len()
    }
}

impl<T, N: IndexableNum> fmt::Display for Leaf<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(f, true, &self.mbr)
    }
}

/// A child node: still lazy if it has children of its own, materialized if it is a leaf.
pub enum Node<'a, T, N: IndexableNum, D> {
    NonLeaf(NodeRef<'a, N, D>),
    Leaf(Leaf<T, N>),
}

impl<'a, T, N: IndexableNum, D> Node<'a, T, N, D> {
    pub fn count(&self) -> usize {
        RTreeNode::count(self)
    }

    pub fn geometry(&self) -> Rectangle<N> {
        self.mbb()
    }

    pub fn as_leaf(&self) -> Option<&Leaf<T, N>> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::NonLeaf(_) => None,
        }
    }

    pub fn as_non_leaf(&self) -> Option<&NodeRef<'a, N, D>> {
        match self {
            Node::NonLeaf(node) => Some(node),
            Node::Leaf(_) => None,
        }
    }
}

impl<T, N: IndexableNum, D> RTreeNode<N> for Node<'_, T, N, D> {
    fn mbb(&self) -> Rectangle<N> {
        match self {
            Node::NonLeaf(node) => node.mbb(),
            Node::Leaf(leaf) => leaf.mbb(),
        }
    }

    fn children_count(&self) -> usize {
        match self {
            Node::NonLeaf(node) => RTreeNode::children_count(node),
            Node::Leaf(leaf) => leaf.children_count(),
        }
    }

    fn entries_count(&self) -> usize {
        match self {
            Node::NonLeaf(node) => RTreeNode::entries_count(node),
            Node::Leaf(leaf) => leaf.entries_count(),
        }
    }
}

impl<T: fmt::Debug, N: IndexableNum, D> fmt::Debug for Node<'_, T, N, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::NonLeaf(node) => f.debug_tuple("NonLeaf").field(node).finish(),
            Node::Leaf(leaf) => f.debug_tuple("Leaf").field(leaf).finish(),
        }
    }
}

impl<T, N: IndexableNum, D> fmt::Display for Node<'_, T, N, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::NonLeaf(node) => fmt::Display::fmt(node, f),
            Node::Leaf(leaf) => fmt::Display::fmt(leaf, f),
        }
    }
}
