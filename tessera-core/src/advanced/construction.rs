//! Region growing around the cut between two blocks.
//!
//! A region starts at batches of cut edges handed out by the
//! [`QuotientGraph`] and grows by breadth-first search, alternating between the
//! two blocks so neither side dominates. The refiner that will consume the
//! region decides when it is large enough and may lock a block to stop it
//! from contributing further nodes.

use std::collections::{HashSet, VecDeque};

use tracing::trace;

use super::quotient_graph::{BlockPair, QuotientGraph};
use crate::{
    config::FlowConfig,
    hypergraph::{PartitionView, PartitionedHypergraph},
    ownership::NodeOwnership,
    types::{BlockId, EdgeId, NodeId, NodeWeight, SearchId},
};

/// Size bookkeeping of a region under construction.
#[derive(Clone, Debug)]
pub struct ProblemStats {
    pair: BlockPair,
    weights: [NodeWeight; 2],
    locked: [bool; 2],
    num_nodes: usize,
    visited_edges: HashSet<EdgeId>,
}

impl ProblemStats {
    /// Empty stats for a region between the blocks of `pair`.
    #[must_use]
    pub fn new(pair: BlockPair) -> Self {
        Self {
            pair,
            weights: [0; 2],
            locked: [false; 2],
            num_nodes: 0,
            visited_edges: HashSet::new(),
        }
    }

    /// Returns the blocks the region straddles.
    #[must_use]
    #[rustfmt::skip]
    pub fn block_pair(&self) -> BlockPair { self.pair }

    /// Returns `true` when `b` is one of the region's blocks.
    #[must_use]
    pub fn is_block_contained(&self, b: BlockId) -> bool {
        self.pair.contains(b)
    }

    /// Region weight taken from block `b`.
    #[must_use]
    pub fn block_weight(&self, b: BlockId) -> NodeWeight {
        self.slot(b).map_or(0, |i| self.weights[i])
    }

    /// Stops block `b` from contributing further nodes.
    pub fn lock_block(&mut self, b: BlockId) {
        if let Some(i) = self.slot(b) {
            self.locked[i] = true;
        }
    }

    /// Returns `true` when block `b` may not contribute further nodes. Blocks
    /// outside the pair count as locked.
    #[must_use]
    pub fn is_locked(&self, b: BlockId) -> bool {
        self.slot(b).is_none_or(|i| self.locked[i])
    }

    /// Number of nodes in the region.
    #[must_use]
    #[rustfmt::skip]
    pub fn num_nodes(&self) -> usize { self.num_nodes }

    /// Number of distinct edges incident to region nodes.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.visited_edges.len()
    }

    fn add_node(&mut self, block: BlockId, weight: NodeWeight) {
        if let Some(i) = self.slot(block) {
            self.weights[i] += weight;
            self.num_nodes += 1;
        }
    }

    fn slot(&self, b: BlockId) -> Option<usize> {
        if b == self.pair.block_0 {
            Some(0)
        } else if b == self.pair.block_1 {
            Some(1)
        } else {
            None
        }
    }
}

/// Decides when a region has grown enough.
///
/// Called after every accepted node; implementations may lock a block through
/// [`ProblemStats::lock_block`] before answering.
pub trait RegionLimit {
    /// Returns `true` once no further node should be added.
    fn is_maximum_problem_size_reached(&self, stats: &mut ProblemStats) -> bool;
}

/// A region extracted for one search.
#[derive(Clone, Debug)]
pub struct Subproblem {
    /// The blocks the region straddles.
    pub pair: BlockPair,
    /// Region nodes in the order they were added.
    pub nodes: Vec<NodeId>,
    /// Final size bookkeeping.
    pub stats: ProblemStats,
}

/// Breadth-first frontier of both blocks.
///
/// `queue` holds the current distance layer, `next_queue` the following one.
#[derive(Debug, Default)]
struct BfsData {
    queue: [VecDeque<NodeId>; 2],
    next_queue: [VecDeque<NodeId>; 2],
    current_distance: usize,
    last_queue: usize,
    visited_nodes: HashSet<NodeId>,
    visited_edges: HashSet<EdgeId>,
}

impl BfsData {
    fn is_empty(&self) -> bool {
        self.queue.iter().all(VecDeque::is_empty)
    }

    fn clear_queue(&mut self, slot: usize) {
        self.queue[slot].clear();
        self.next_queue[slot].clear();
    }

    fn clear_queues(&mut self) {
        self.current_distance = 0;
        self.last_queue = 0;
        self.clear_queue(0);
        self.clear_queue(1);
    }

    fn swap_with_next_queue(&mut self) {
        if !self.next_queue.iter().all(VecDeque::is_empty) {
            std::mem::swap(&mut self.queue, &mut self.next_queue);
            self.current_distance += 1;
        }
    }

    /// Pops from the two frontiers in turn, skipping an empty one.
    fn pop(&mut self) -> Option<NodeId> {
        let mut slot = self.last_queue % 2;
        self.last_queue += 1;
        if self.queue[slot].is_empty() {
            slot = self.last_queue % 2;
            self.last_queue += 1;
        }
        self.queue[slot].pop_front()
    }

    fn add_pins_of_edge(
        &mut self,
        e: EdgeId,
        phg: &PartitionedHypergraph,
        stats: &ProblemStats,
        max_bfs_distance: usize,
    ) {
        if self.current_distance > max_bfs_distance || !self.visited_edges.insert(e) {
            return;
        }
        let pair = stats.block_pair();
        for &pin in phg.hypergraph().pins(e) {
            let block = phg.part_id(pin);
            if stats.is_locked(block) || self.visited_nodes.contains(&pin) {
                continue;
            }
            let slot = usize::from(block == pair.block_1);
            self.next_queue[slot].push_back(pin);
            self.visited_nodes.insert(pin);
        }
    }
}

/// Builds regions for concurrent searches.
#[derive(Debug)]
pub struct ProblemConstruction<'a> {
    phg: &'a PartitionedHypergraph,
    ownership: &'a NodeOwnership,
    config: &'a FlowConfig,
}

impl<'a> ProblemConstruction<'a> {
    /// Creates a constructor claiming nodes through `ownership`.
    #[must_use]
    pub fn new(
        phg: &'a PartitionedHypergraph,
        ownership: &'a NodeOwnership,
        config: &'a FlowConfig,
    ) -> Self {
        Self {
            phg,
            ownership,
            config,
        }
    }

    /// Grows the region of `search` until `limit` reports it full or the
    /// quotient graph runs out of cut edges for the search's pair.
    ///
    /// Outside overlapping mode every returned node is owned by `search`;
    /// hand them back with [`ProblemConstruction::release_nodes`].
    pub fn construct<L: RegionLimit + ?Sized>(
        &self,
        search: SearchId,
        quotient_graph: &QuotientGraph,
        limit: &L,
    ) -> Option<Subproblem> {
        let pair = quotient_graph.block_pair(search)?;
        let max_bfs_distance = self.config.max_bfs_distance;
        let mut stats = ProblemStats::new(pair);
        let mut bfs = BfsData::default();
        let mut nodes = Vec::new();
        let mut requested = 0;

        while !limit.is_maximum_problem_size_reached(&mut stats) {
            let cut_edges = quotient_graph.request_cut_edges(
                search,
                self.config.num_cut_edges_per_block_pair,
                self.phg,
            );
            requested += cut_edges.len();
            bfs.clear_queues();
            for &e in &cut_edges {
                bfs.add_pins_of_edge(e, self.phg, &stats, max_bfs_distance);
            }
            bfs.swap_with_next_queue();
            if bfs.is_empty() {
                break;
            }

            while !bfs.is_empty() && !limit.is_maximum_problem_size_reached(&mut stats) {
                let Some(u) = bfs.pop() else {
                    break;
                };
                let block = self.phg.part_id(u);
                if stats.is_locked(block) {
                    if let Some(slot) = stats.slot(block) {
                        bfs.clear_queue(slot);
                    }
                } else if self.config.use_overlapping_searches || self.ownership.try_acquire(u, search) {
                    let block = self.phg.part_id(u);
                    if stats.is_block_contained(block) {
                        nodes.push(u);
                        stats.add_node(block, self.phg.hypergraph().node_weight(u));
                        for &e in self.phg.hypergraph().incident_edges(u) {
                            bfs.add_pins_of_edge(e, self.phg, &stats, max_bfs_distance);
                            stats.visited_edges.insert(e);
                        }
                    } else if !self.config.use_overlapping_searches {
                        self.ownership.release(u, search);
                    }
                }
                if bfs.is_empty() {
                    bfs.swap_with_next_queue();
                }
            }
        }

        let visited: Vec<EdgeId> = stats.visited_edges.iter().copied().collect();
        requested += quotient_graph.acquire_used_cut_edges(search, &visited);
        trace!(
            search,
            block_0 = pair.block_0,
            block_1 = pair.block_1,
            nodes = nodes.len(),
            used_cut_edges = requested,
            "region constructed"
        );
        Some(Subproblem { pair, nodes, stats })
    }

    /// Hands back ownership of the region's nodes.
    pub fn release_nodes(&self, search: SearchId, subproblem: &Subproblem) {
        if self.config.use_overlapping_searches {
            return;
        }
        for &u in &subproblem.nodes {
            self.ownership.release(u, search);
        }
    }
}
