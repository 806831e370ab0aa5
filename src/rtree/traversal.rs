//! The depth-first search over a serialized tree.
//!
//! The walk is a plain recursion over [`NodeCursor`]s. Each recursion level owns exactly one child
//! cursor, which it repositions for every sibling; the entry, geometry and box cursors used for
//! leaf decoding live in one [`Scratch`] shared by the whole walk. Sharing is sound because the
//! walk is sequential: a shared cursor is never read after a deeper call has repositioned it.
//!
//! Recursion depth is capped by [`SearchOptions::max_depth`], which never exceeds
//! [`MAX_HEIGHT`][crate::rtree::constants::MAX_HEIGHT].

use std::marker::PhantomData;

use log::{debug, trace, warn};

use crate::error::{BoxError, RTreeError, Result};
use crate::geometry::Geometry;
use crate::r#type::IndexableNum;
use crate::rtree::cursor::{BoxCursor, EntryCursor, GeometryCursor, NodeCursor};
use crate::rtree::decode::{decode_box, decode_geometry, decode_payload};
use crate::rtree::entry::Entry;
use crate::rtree::sink::{DeserializeErrorPolicy, SearchOptions, SearchStats, SearchStatus, Sink};

/// Search the tree in `data` starting from the node record at `root_offset`.
///
/// `criterion` is applied to every visited node's bounding box (as [`Geometry::Rectangle`]) and
/// to every entry geometry under an accepted node. It must reject every geometry contained in a
/// box it rejects, otherwise matching entries may be pruned away. Payloads are only handed to
/// `deserializer` for entries the criterion accepts.
///
/// A node more than `options.max_depth` levels below the start fails with
/// [`RTreeError::MalformedNode`].
///
/// An `Err` means the walk was aborted; entries pushed before the failure stay in `sink`.
pub fn search<'a, T, E, N, C, S, D>(
    data: &'a [u8],
    root_offset: usize,
    criterion: C,
    sink: &mut S,
    deserializer: D,
    options: &SearchOptions,
) -> Result<SearchStats>
where
    N: IndexableNum,
    C: FnMut(&Geometry<N>) -> bool,
    S: Sink<T, N> + ?Sized,
    D: FnMut(&[u8]) -> std::result::Result<T, E>,
    E: Into<BoxError>,
{
    let root = NodeCursor::<N>::at(data, root_offset)?;
    let mut walk = Walk {
        data,
        criterion,
        sink,
        deserializer,
        options: options.with_max_depth(options.max_depth),
        scratch: Scratch::new(data),
        stats: SearchStats::default(),
        phantom: PhantomData,
    };

    match walk.visit(&root, 1) {
        Ok(()) => {
            if walk.stats.status == SearchStatus::Canceled {
                debug!(
                    "search from offset {} canceled after {} results",
                    root_offset, walk.stats.results
                );
            }
            Ok(walk.stats)
        }
        Err(err) => {
            debug!(
                "search from offset {} aborted after {} results: {}",
                root_offset, walk.stats.results, err
            );
            Err(err)
        }
    }
}

/// Cursors shared by every level of one walk.
struct Scratch<'a, N: IndexableNum> {
    entry: EntryCursor<'a, N>,
    geometry: GeometryCursor<'a, N>,
    bbox: BoxCursor<'a, N>,
}

impl<'a, N: IndexableNum> Scratch<'a, N> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            entry: EntryCursor::new(data),
            geometry: GeometryCursor::new(data),
            bbox: BoxCursor::new(data),
        }
    }
}

struct Walk<'a, 's, T, E, N: IndexableNum, C, S: ?Sized, D> {
    data: &'a [u8],
    criterion: C,
    sink: &'s mut S,
    deserializer: D,
    options: SearchOptions,
    scratch: Scratch<'a, N>,
    stats: SearchStats,
    phantom: PhantomData<fn() -> (T, E)>,
}

impl<'a, T, E, N, C, S, D> Walk<'a, '_, T, E, N, C, S, D>
where
    N: IndexableNum,
    C: FnMut(&Geometry<N>) -> bool,
    S: Sink<T, N> + ?Sized,
    D: FnMut(&[u8]) -> std::result::Result<T, E>,
    E: Into<BoxError>,
{
    #[inline]
    fn canceled(&mut self) -> bool {
        if self.sink.is_canceled() {
            self.stats.status = SearchStatus::Canceled;
            true
        } else {
            false
        }
    }

    fn visit(&mut self, node: &NodeCursor<'a, N>, depth: usize) -> Result<()> {
        if depth > self.options.max_depth {
            warn!(
                "node at offset {} is deeper than {} levels",
                node.offset(),
                self.options.max_depth
            );
            return Err(RTreeError::MalformedNode {
                offset: node.offset(),
            });
        }
        self.stats.nodes_visited += 1;
        node.mbb(&mut self.scratch.bbox);
        let mbb = Geometry::Rectangle(decode_box(&self.scratch.bbox));
        if !(self.criterion)(&mbb) {
            self.stats.nodes_pruned += 1;
            trace!("pruned subtree at offset {}", node.offset());
            return Ok(());
        }

        if node.is_leaf() {
            self.visit_entries(node)
        } else {
            self.visit_children(node, depth)
        }
    }

    fn visit_children(&mut self, node: &NodeCursor<'a, N>, depth: usize) -> Result<()> {
        // The cursor for this depth; siblings reuse it, deeper levels get their own.
        let mut child = NodeCursor::new(self.data);
        for i in 0..node.children_count() {
            if self.canceled() {
                return Ok(());
            }
            node.child(i, &mut child)?;
            self.visit(&child, depth + 1)?;
        }
        Ok(())
    }

    fn visit_entries(&mut self, node: &NodeCursor<'a, N>) -> Result<()> {
        for i in 0..node.entries_count() {
            if self.canceled() {
                return Ok(());
            }

            let Scratch {
                entry,
                geometry,
                bbox,
            } = &mut self.scratch;
            node.entry(i, entry)?;
            entry.geometry(geometry)?;
            let decoded = decode_geometry(geometry, bbox);
            self.stats.entries_decoded += 1;

            if !(self.criterion)(&decoded) {
                continue;
            }

            let offset = entry.offset();
            match (self.deserializer)(decode_payload(entry)) {
                Ok(value) => {
                    self.sink.push(Entry::new(value, decoded));
                    self.stats.results += 1;
                }
                Err(err) => match self.options.on_deserialize_error {
                    DeserializeErrorPolicy::Abort => {
                        return Err(RTreeError::Deserialization {
                            offset,
                            source: err.into(),
                        });
                    }
                    DeserializeErrorPolicy::Skip => {
                        let source: BoxError = err.into();
                        warn!("skipping entry at offset {}: {}", offset, source);
                        self.stats.skipped += 1;
                    }
                },
            }
        }
        Ok(())
    }
}
