//! An immutable R-tree searched in place over its serialized buffer.
//!
//! ### Creation
//!
//! Use [`RTreeWriter`] to lay out a tree, or wrap an existing buffer with
//! [`SerializedRTree::try_new`] or [`SerializedRTreeRef::try_new`].
//!
//! ### Search
//!
//! Use [`RTreeIndex::search`] to stream every entry accepted by a criterion into a [`Sink`], or
//! [`RTreeIndex::search_rect`] to collect the entries intersecting a rectangle. Use
//! [`RTreeIndex::root`] to walk the tree node by node.

pub mod builder;
pub mod constants;
pub mod cursor;
pub mod decode;
pub mod entry;
pub mod index;
pub mod node;
pub mod sink;
pub mod r#trait;
pub mod traversal;

pub use builder::RTreeWriter;
pub use cursor::{BoxCursor, EntryCursor, GeometryCursor, GeometryType, NodeCursor};
pub use entry::Entry;
pub use index::{RTreeMetadata, SerializedRTree, SerializedRTreeRef};
pub use node::{Leaf, Node, NodeRef, RTreeNode};
pub use r#trait::RTreeIndex;
pub use sink::{
    Cancellable, CancellationToken, DeserializeErrorPolicy, Limit, SearchOptions, SearchStats,
    SearchStatus, Sink,
};
