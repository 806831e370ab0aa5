use geo_traits::RectTrait;

use crate::error::{BoxError, Result};
use crate::geometry::{Geometry, Rectangle, Shape};
use crate::r#type::IndexableNum;
use crate::rtree::cursor::NodeCursor;
use crate::rtree::entry::Entry;
use crate::rtree::index::{RTreeMetadata, SerializedRTree, SerializedRTreeRef};
use crate::rtree::node::NodeRef;
use crate::rtree::sink::{SearchOptions, SearchStats, Sink};
use crate::rtree::traversal;

/// A trait for searching and accessing data out of a serialized RTree.
pub trait RTreeIndex<N: IndexableNum>: Sized {
    /// The full serialized buffer, header included.
    fn data(&self) -> &[u8];

    /// Access the metadata describing this RTree
    fn metadata(&self) -> &RTreeMetadata<N>;

    /// The number of levels (height) of the tree.
    fn height(&self) -> usize {
        self.metadata().height()
    }

    /// The byte offset of the root node record.
    fn root_offset(&self) -> usize {
        self.metadata().root_offset()
    }

    /// A cursor positioned on the root node.
    fn root_cursor(&self) -> Result<NodeCursor<'_, N>> {
        NodeCursor::at(self.data(), self.root_offset())
    }

    /// Search the tree from the root.
    ///
    /// Every node whose bounding box `criterion` rejects is skipped with its whole subtree. Each
    /// entry whose geometry `criterion` accepts is deserialized and pushed to `sink`. Failing
    /// deserializers abort the search; see [`RTreeIndex::search_with_options`] to change that.
    ///
    /// ```
    /// use frozen_rtree::geometry::{Geometry, Point, Rectangle, Shape};
    /// use frozen_rtree::rtree::decode::utf8_payload;
    /// use frozen_rtree::rtree::{RTreeIndex, RTreeWriter};
    ///
    /// let mut writer = RTreeWriter::<f64>::new();
    /// let leaf = writer
    ///     .add_leaf([
    ///         (Point::new(1., 1.).into(), &b"near"[..]),
    ///         (Point::new(50., 50.).into(), &b"far"[..]),
    ///     ])
    ///     .unwrap();
    /// let tree = writer.finish(leaf).unwrap();
    ///
    /// let query = Rectangle::new(0., 0., 10., 10.);
    /// let mut results = vec![];
    /// let stats = tree
    ///     .search(|g: &Geometry<f64>| g.intersects(&query), &mut results, utf8_payload)
    ///     .unwrap();
    /// assert!(stats.is_complete());
    /// assert_eq!(results.len(), 1);
    /// assert_eq!(results[0].value(), "near");
    /// ```
    fn search<T, E, C, S, D>(
        &self,
        criterion: C,
        sink: &mut S,
        deserializer: D,
    ) -> Result<SearchStats>
    where
        C: FnMut(&Geometry<N>) -> bool,
        S: Sink<T, N> + ?Sized,
        D: FnMut(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        self.search_with_options(criterion, sink, deserializer, &SearchOptions::default())
    }

    /// Search the tree from the root with explicit [`SearchOptions`].
    fn search_with_options<T, E, C, S, D>(
        &self,
        criterion: C,
        sink: &mut S,
        deserializer: D,
        options: &SearchOptions,
    ) -> Result<SearchStats>
    where
        C: FnMut(&Geometry<N>) -> bool,
        S: Sink<T, N> + ?Sized,
        D: FnMut(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        self.search_from(self.root_offset(), criterion, sink, deserializer, options)
    }

    /// Search the subtree rooted at the node record at `offset`.
    ///
    /// The walk descends at most [`RTreeIndex::height`] levels; a deeper node fails the search
    /// with [`RTreeError::MalformedNode`][crate::RTreeError::MalformedNode].
    fn search_from<T, E, C, S, D>(
        &self,
        offset: usize,
        criterion: C,
        sink: &mut S,
        deserializer: D,
        options: &SearchOptions,
    ) -> Result<SearchStats>
    where
        C: FnMut(&Geometry<N>) -> bool,
        S: Sink<T, N> + ?Sized,
        D: FnMut(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        let options = options.with_max_depth(options.max_depth.min(self.height()));
        traversal::search(self.data(), offset, criterion, sink, deserializer, &options)
    }

    /// Collect every entry whose geometry intersects `rect`.
    fn search_rect<T, E, D>(
        &self,
        rect: &impl RectTrait<T = N>,
        deserializer: D,
    ) -> Result<Vec<Entry<T, N>>>
    where
        D: FnMut(&[u8]) -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        let query = Rectangle::from_rect(rect);
        let mut results = vec![];
        self.search(
            |g: &Geometry<N>| g.intersects(&query),
            &mut results,
            deserializer,
        )?;
        Ok(results)
    }

    /// Access the root node of the RTree for manual traversal.
    fn root<'a, D>(&'a self, deserializer: &'a D) -> Result<NodeRef<'a, N, D>> {
        self.node(self.root_offset(), deserializer)
    }

    /// Access the node record at `offset`.
    fn node<'a, D>(&'a self, offset: usize, deserializer: &'a D) -> Result<NodeRef<'a, N, D>> {
        NodeRef::try_new(self.data(), offset, deserializer)
    }
}

impl<N: IndexableNum> RTreeIndex<N> for SerializedRTree<N> {
    fn data(&self) -> &[u8] {
        &self.buffer
    }

    fn metadata(&self) -> &RTreeMetadata<N> {
        &self.metadata
    }
}

impl<N: IndexableNum> RTreeIndex<N> for SerializedRTreeRef<'_, N> {
    fn data(&self) -> &[u8] {
        self.data
    }

    fn metadata(&self) -> &RTreeMetadata<N> {
        &self.metadata
    }
}

#[cfg(test)]
mod test {
    use crate::error::RTreeError;
    use crate::geometry::{Geometry, Point, Rectangle};
    use crate::rtree::decode::{copy_payload, utf8_payload};
    use crate::rtree::sink::{DeserializeErrorPolicy, SearchOptions};
    use crate::rtree::{Entry, RTreeIndex, RTreeWriter, SerializedRTree, SerializedRTreeRef};
    use crate::test::{grid_tree, two_leaf_tree};

    #[test]
    fn search_rect_on_owned_and_borrowed_trees() {
        let (tree, _) = two_leaf_tree();
        let query = Rectangle::new(90.0, 90.0, 120.0, 120.0);

        let owned = tree.search_rect(&query, utf8_payload).unwrap();
        let tree_ref = SerializedRTreeRef::<f64>::try_new(&tree).unwrap();
        let borrowed = tree_ref.search_rect(&query, utf8_payload).unwrap();

        assert_eq!(owned, vec![Entry::new("B".to_string(), Point::new(99.0, 99.0))]);
        assert_eq!(owned, borrowed);
    }

    #[test]
    fn search_rect_touching_edge() {
        let (tree, _) = grid_tree(5, 2);
        let results = tree
            .search_rect(&Rectangle::new(4.0, 4.0, 10.0, 10.0), copy_payload)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].geometry(), &Geometry::Point(Point::new(4.0, 4.0)));
    }

    #[test]
    fn search_from_node_offset() {
        let (tree, root) = two_leaf_tree();
        let first_leaf = tree.root_cursor().unwrap().child_offset(0).unwrap();
        let mut results = vec![];
        let stats = tree
            .search_from(
                first_leaf,
                |_: &Geometry<f64>| true,
                &mut results,
                utf8_payload,
                &SearchOptions::default(),
            )
            .unwrap();
        assert_eq!(stats.nodes_visited, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value(), "A");
        assert_ne!(first_leaf, root);
    }

    #[test]
    fn header_height_bounds_the_walk() {
        let mut writer = RTreeWriter::<u8>::new();
        let mut node = writer
            .add_leaf([(Point::new(1, 1).into(), &b"deep"[..])])
            .unwrap();
        let mut chain = vec![node];
        for _ in 0..5 {
            node = writer.add_parent(&[node]).unwrap();
            chain.push(node);
        }
        let mut buffer = writer.finish(node).unwrap().into_inner();
        assert_eq!(u16::from_ne_bytes([buffer[2], buffer[3]]), 6);
        buffer[2..4].copy_from_slice(&2u16.to_ne_bytes());

        let tree = SerializedRTree::<u8>::try_new(buffer).unwrap();
        assert_eq!(tree.height(), 2);
        let mut results: Vec<Entry<Vec<u8>, u8>> = vec![];
        let err = tree
            .search(|_: &Geometry<u8>| true, &mut results, copy_payload)
            .unwrap_err();
        // Third level from the root.
        assert!(matches!(err, RTreeError::MalformedNode { offset } if offset == chain[3]));
        assert!(results.is_empty());
    }

    #[test]
    fn search_with_skip_policy() {
        let (tree, _) = grid_tree(3, 4);
        let mut results = vec![];
        let options =
            SearchOptions::default().with_deserialize_error_policy(DeserializeErrorPolicy::Skip);
        let stats = tree
            .search_with_options(
                |_: &Geometry<f64>| true,
                &mut results,
                |bytes: &[u8]| match bytes {
                    b"1,1" => Err("center"),
                    other => Ok(other.to_vec()),
                },
                &options,
            )
            .unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(results.len(), 8);
    }
}
