//! Result sinks, cancellation, and per-query options.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::r#type::IndexableNum;
use crate::rtree::constants::MAX_HEIGHT;
use crate::rtree::entry::Entry;

/// Receives the entries matched by a search.
///
/// The search polls [`Sink::is_canceled`] before visiting each child node and before decoding each
/// leaf entry. Once it returns `true`, nothing more is pushed.
pub trait Sink<T, N: IndexableNum> {
    fn push(&mut self, entry: Entry<T, N>);

    fn is_canceled(&self) -> bool {
        false
    }
}

impl<T, N: IndexableNum> Sink<T, N> for Vec<Entry<T, N>> {
    fn push(&mut self, entry: Entry<T, N>) {
        Vec::push(self, entry);
    }
}

impl<T, N: IndexableNum, S: Sink<T, N> + ?Sized> Sink<T, N> for &mut S {
    fn push(&mut self, entry: Entry<T, N>) {
        (**self).push(entry);
    }

    fn is_canceled(&self) -> bool {
        (**self).is_canceled()
    }
}

/// A sink that cancels the search once `limit` entries have been pushed.
#[derive(Debug)]
pub struct Limit<S> {
    inner: S,
    remaining: usize,
}

impl<S> Limit<S> {
    pub fn new(inner: S, limit: usize) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<T, N: IndexableNum, S: Sink<T, N>> Sink<T, N> for Limit<S> {
    fn push(&mut self, entry: Entry<T, N>) {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.inner.push(entry);
        }
    }

    fn is_canceled(&self) -> bool {
        self.remaining == 0 || self.inner.is_canceled()
    }
}

/// A shared cancellation flag. Clones observe the same flag, so a query can be canceled from
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A sink that is canceled when its [`CancellationToken`] is.
#[derive(Debug)]
pub struct Cancellable<S> {
    inner: S,
    token: CancellationToken,
}

impl<S> Cancellable<S> {
    pub fn new(inner: S, token: CancellationToken) -> Self {
        Self { inner, token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<T, N: IndexableNum, S: Sink<T, N>> Sink<T, N> for Cancellable<S> {
    fn push(&mut self, entry: Entry<T, N>) {
        self.inner.push(entry);
    }

    fn is_canceled(&self) -> bool {
        self.token.is_canceled() || self.inner.is_canceled()
    }
}

/// What a search does when the payload deserializer fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeserializeErrorPolicy {
    /// Stop the search and return the error.
    #[default]
    Abort,
    /// Leave the entry out of the results, count it in [`SearchStats::skipped`], and continue.
    Skip,
}

/// Options for a single search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub on_deserialize_error: DeserializeErrorPolicy,
    /// Number of levels the walk may descend, counting the node it starts from. A deeper node
    /// fails the search with [`RTreeError::MalformedNode`][crate::RTreeError::MalformedNode].
    pub max_depth: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            on_deserialize_error: DeserializeErrorPolicy::default(),
            max_depth: MAX_HEIGHT as usize,
        }
    }
}

impl SearchOptions {
    pub fn with_deserialize_error_policy(mut self, policy: DeserializeErrorPolicy) -> Self {
        self.on_deserialize_error = policy;
        self
    }

    /// Set the depth limit. Values above [`MAX_HEIGHT`] are clamped to it.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(MAX_HEIGHT as usize);
        self
    }
}

/// How a search that returned `Ok` ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchStatus {
    /// Every subtree accepted by the criterion was visited.
    #[default]
    Complete,
    /// The sink reported cancellation and the walk stopped early.
    Canceled,
}

/// Counters collected while walking the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub status: SearchStatus,
    /// Nodes whose bounding box was tested against the criterion.
    pub nodes_visited: usize,
    /// Nodes rejected by the criterion, whose subtrees were skipped.
    pub nodes_pruned: usize,
    /// Leaf entries whose geometry was decoded.
    pub entries_decoded: usize,
    /// Entries pushed to the sink.
    pub results: usize,
    /// Matching entries dropped under [`DeserializeErrorPolicy::Skip`].
    pub skipped: usize,
}

impl SearchStats {
    pub fn is_complete(&self) -> bool {
        self.status == SearchStatus::Complete
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Point;

    fn entry(value: u8) -> Entry<u8, f64> {
        Entry::new(value, Point::new(0.0, 0.0))
    }

    #[test]
    fn limit_cancels_after_n_pushes() {
        let mut sink = Limit::new(Vec::new(), 2);
        assert!(!Sink::<u8, f64>::is_canceled(&sink));
        sink.push(entry(1));
        sink.push(entry(2));
        assert!(Sink::<u8, f64>::is_canceled(&sink));
        sink.push(entry(3));
        assert_eq!(sink.into_inner().len(), 2);
    }

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let sink: Cancellable<Vec<Entry<u8, f64>>> = Cancellable::new(Vec::new(), token.clone());
        assert!(!Sink::<u8, f64>::is_canceled(&sink));
        token.cancel();
        assert!(Sink::<u8, f64>::is_canceled(&sink));
        assert!(sink.token().is_canceled());
    }

    #[test]
    fn options_default_to_abort() {
        let options = SearchOptions::default();
        assert_eq!(options.on_deserialize_error, DeserializeErrorPolicy::Abort);
        let options = options.with_deserialize_error_policy(DeserializeErrorPolicy::Skip);
        assert_eq!(options.on_deserialize_error, DeserializeErrorPolicy::Skip);
    }

    #[test]
    fn max_depth_is_clamped() {
        let options = SearchOptions::default();
        assert_eq!(options.max_depth, MAX_HEIGHT as usize);
        assert_eq!(options.with_max_depth(3).max_depth, 3);
        assert_eq!(
            options.with_max_depth(usize::MAX).max_depth,
            MAX_HEIGHT as usize
        );
    }
}
