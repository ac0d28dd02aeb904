//! Cut edges bucketed by the block pairs they connect.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use dashmap::{DashMap, DashSet};
use rayon::prelude::*;

use crate::{
    hypergraph::{PartitionView, PartitionedHypergraph},
    types::{BlockId, EdgeId, SearchId},
};

/// Two distinct blocks, stored with `block_0 < block_1`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BlockPair {
    /// The smaller block id.
    pub block_0: BlockId,
    /// The larger block id.
    pub block_1: BlockId,
}

impl BlockPair {
    /// Orders `a` and `b`.
    #[must_use]
    pub fn new(a: BlockId, b: BlockId) -> Self {
        debug_assert_ne!(a, b, "a block pair needs two distinct blocks");
        Self {
            block_0: a.min(b),
            block_1: a.max(b),
        }
    }

    /// Returns `true` when `b` is one of the two blocks.
    #[must_use]
    pub fn contains(self, b: BlockId) -> bool {
        b == self.block_0 || b == self.block_1
    }
}

#[derive(Debug, Default)]
struct CutEdges {
    /// Ascending.
    edges: Vec<EdgeId>,
    cursor: AtomicUsize,
    used: DashSet<EdgeId>,
}

/// Snapshot of which edges were cut between which block pairs, plus the
/// searches currently working on each pair.
///
/// Edges are handed out at most once per pair: either through
/// [`QuotientGraph::request_cut_edges`] or because a search reported them as
/// visited through [`QuotientGraph::acquire_used_cut_edges`].
#[derive(Debug)]
pub struct QuotientGraph {
    k: usize,
    pairs: Vec<CutEdges>,
    searches: DashMap<SearchId, BlockPair>,
    next_search: AtomicU32,
}

impl QuotientGraph {
    /// Buckets every edge of `phg` into each pair of blocks it connects.
    #[must_use]
    pub fn new(phg: &PartitionedHypergraph) -> Self {
        let k = phg.k();
        let hg = phg.hypergraph();
        let incidences: Vec<(usize, EdgeId)> = hg
            .edges()
            .into_par_iter()
            .flat_map_iter(|e| {
                let blocks: Vec<BlockId> = (0..k as BlockId)
                    .filter(|&b| phg.pin_count_in_part(e, b) > 0)
                    .collect();
                let mut pairs = Vec::new();
                for (i, &a) in blocks.iter().enumerate() {
                    for &b in &blocks[i + 1..] {
                        pairs.push((a as usize * k + b as usize, e));
                    }
                }
                pairs
            })
            .collect();

        let mut pairs: Vec<CutEdges> = (0..k * k).map(|_| CutEdges::default()).collect();
        for (index, e) in incidences {
            pairs[index].edges.push(e);
        }
        Self {
            k,
            pairs,
            searches: DashMap::new(),
            next_search: AtomicU32::new(0),
        }
    }

    /// Returns the number of blocks.
    #[must_use]
    #[rustfmt::skip]
    pub fn k(&self) -> usize { self.k }

    /// Block pairs that were cut when the snapshot was taken.
    #[must_use]
    pub fn block_pairs(&self) -> Vec<BlockPair> {
        (0..self.k as BlockId)
            .flat_map(|a| ((a + 1)..self.k as BlockId).map(move |b| BlockPair::new(a, b)))
            .filter(|&pair| !self.cut_edges(pair).edges.is_empty())
            .collect()
    }

    /// Number of cut edges of `pair` not handed out yet.
    #[must_use]
    pub fn num_remaining_cut_edges(&self, pair: BlockPair) -> usize {
        let list = self.cut_edges(pair);
        let cursor = list.cursor.load(Ordering::Acquire).min(list.edges.len());
        list.edges[cursor..]
            .iter()
            .filter(|e| !list.used.contains(*e))
            .count()
    }

    /// Starts a search on `pair` and returns its id.
    pub fn register_search(&self, pair: BlockPair) -> SearchId {
        let search = self.next_search.fetch_add(1, Ordering::Relaxed);
        self.searches.insert(search, pair);
        search
    }

    /// Returns the pair a running search works on.
    #[must_use]
    pub fn block_pair(&self, search: SearchId) -> Option<BlockPair> {
        self.searches.get(&search).map(|entry| *entry.value())
    }

    /// Ends a search.
    pub fn finalize_search(&self, search: SearchId) {
        self.searches.remove(&search);
    }

    /// Number of searches currently registered.
    #[must_use]
    pub fn num_active_searches(&self) -> usize {
        self.searches.len()
    }

    /// Hands out up to `n` edges of the search's pair that are still cut
    /// between both blocks and were not handed out before.
    #[must_use]
    pub fn request_cut_edges(
        &self,
        search: SearchId,
        n: usize,
        phg: &PartitionedHypergraph,
    ) -> Vec<EdgeId> {
        let Some(pair) = self.block_pair(search) else {
            return Vec::new();
        };
        let list = self.cut_edges(pair);
        let mut edges = Vec::with_capacity(n);
        while edges.len() < n {
            let position = list.cursor.fetch_add(1, Ordering::AcqRel);
            let Some(&e) = list.edges.get(position) else {
                break;
            };
            let still_cut = phg.pin_count_in_part(e, pair.block_0) > 0
                && phg.pin_count_in_part(e, pair.block_1) > 0;
            if still_cut && list.used.insert(e) {
                edges.push(e);
            }
        }
        edges
    }

    /// Marks the cut edges among `visited` as used by `search` so no later
    /// request hands them out again. Returns how many were newly acquired.
    pub fn acquire_used_cut_edges(&self, search: SearchId, visited: &[EdgeId]) -> usize {
        let Some(pair) = self.block_pair(search) else {
            return 0;
        };
        let list = self.cut_edges(pair);
        visited
            .iter()
            .filter(|&&e| list.edges.binary_search(&e).is_ok() && list.used.insert(e))
            .count()
    }

    fn cut_edges(&self, pair: BlockPair) -> &CutEdges {
        &self.pairs[pair.block_0 as usize * self.k + pair.block_1 as usize]
    }
}
