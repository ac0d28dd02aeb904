//! Concurrently mutable block assignment on top of a [`Hypergraph`].
//!
//! Block ids, block weights and per-(edge, block) pin counts are plain atomics
//! so many refinement workers can move nodes at the same time. The two pin
//! count updates caused by one move on one edge are serialised by a per-edge
//! mutex, which makes the `(from_after, to_after)` pair reported to the caller
//! a consistent snapshot of that edge.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicI64, AtomicU32, Ordering},
};

use rayon::prelude::*;

use super::Hypergraph;
use crate::{
    error::HypergraphError,
    gain::GainCache,
    types::{BlockId, EdgeId, EdgeWeight, NodeId, NodeWeight},
};

/// Pin-count change of one edge caused by one node move.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EdgeUpdate {
    /// The node that moved.
    pub node: NodeId,
    /// The incident edge whose pin counts changed.
    pub edge: EdgeId,
    /// Weight of `edge`.
    pub edge_weight: EdgeWeight,
    /// Number of pins of `edge`.
    pub edge_size: usize,
    /// Block the node left.
    pub from: BlockId,
    /// Block the node entered.
    pub to: BlockId,
    /// Pins of `edge` remaining in `from` after the move.
    pub pin_count_in_from_after: u32,
    /// Pins of `edge` in `to` after the move.
    pub pin_count_in_to_after: u32,
}

/// Read access to a block assignment.
///
/// Implemented by the shared [`PartitionedHypergraph`] and by thread-local
/// speculative overlays, so gain rules can be evaluated against either.
pub trait PartitionView {
    /// Returns the underlying hypergraph.
    fn hypergraph(&self) -> &Hypergraph;

    /// Returns the number of blocks.
    fn k(&self) -> usize;

    /// Returns the block of node `u`.
    fn part_id(&self, u: NodeId) -> BlockId;

    /// Returns the number of pins of edge `e` in block `b`.
    fn pin_count_in_part(&self, e: EdgeId, b: BlockId) -> u32;

    /// Returns the number of blocks edge `e` has pins in.
    fn connectivity(&self, e: EdgeId) -> usize {
        (0..self.k() as BlockId)
            .filter(|&b| self.pin_count_in_part(e, b) > 0)
            .count()
    }
}

/// A hypergraph together with a `k`-way partition that supports concurrent
/// node moves.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use tessera_core::{Hypergraph, PartitionView, PartitionedHypergraph};
///
/// let hg = Arc::new(Hypergraph::with_unit_weights(3, [vec![0, 1], vec![1, 2]]).expect("valid hypergraph"));
/// let phg = PartitionedHypergraph::new(hg, 2, vec![0, 0, 1]).expect("valid partition");
/// assert_eq!(phg.part_weight(0), 2);
/// assert_eq!(phg.connectivity(1), 2);
///
/// assert!(phg.change_node_part(2, 1, 0, i64::MAX, |_| {}));
/// assert_eq!(phg.part_weight(0), 3);
/// assert_eq!(phg.connectivity(1), 1);
/// ```
#[derive(Debug)]
pub struct PartitionedHypergraph {
    hypergraph: Arc<Hypergraph>,
    k: usize,
    part_ids: Vec<AtomicU32>,
    part_weights: Vec<AtomicI64>,
    pin_counts: Vec<AtomicU32>,
    edge_locks: Vec<Mutex<()>>,
}

impl PartitionedHypergraph {
    /// Wraps `hypergraph` with the block assignment `blocks`.
    ///
    /// # Errors
    /// Returns [`HypergraphError::TooFewBlocks`] for `k < 2`,
    /// [`HypergraphError::AssignmentLengthMismatch`] when `blocks` does not
    /// cover every node, and [`HypergraphError::InvalidBlock`] when a block id
    /// is out of range.
    pub fn new(
        hypergraph: Arc<Hypergraph>,
        k: usize,
        blocks: Vec<BlockId>,
    ) -> Result<Self, HypergraphError> {
        if k < 2 {
            return Err(HypergraphError::TooFewBlocks { k });
        }
        if blocks.len() != hypergraph.num_nodes() {
            return Err(HypergraphError::AssignmentLengthMismatch {
                got: blocks.len(),
                expected: hypergraph.num_nodes(),
            });
        }
        if let Some((node, &block)) = blocks
            .iter()
            .enumerate()
            .find(|&(_, &block)| block as usize >= k)
        {
            return Err(HypergraphError::InvalidBlock {
                node: node as NodeId,
                block,
                k,
            });
        }

        let mut weights = vec![0; k];
        for (u, &block) in blocks.iter().enumerate() {
            weights[block as usize] += hypergraph.node_weight(u as NodeId);
        }

        let pin_counts: Vec<AtomicU32> = (0..hypergraph.num_edges() * k)
            .map(|_| AtomicU32::new(0))
            .collect();
        hypergraph.edges().into_par_iter().for_each(|e| {
            for &pin in hypergraph.pins(e) {
                pin_counts[e as usize * k + blocks[pin as usize] as usize]
                    .fetch_add(1, Ordering::Relaxed);
            }
        });

        let edge_locks = (0..hypergraph.num_edges()).map(|_| Mutex::new(())).collect();
        Ok(Self {
            k,
            part_ids: blocks.into_iter().map(AtomicU32::new).collect(),
            part_weights: weights.into_iter().map(AtomicI64::new).collect(),
            pin_counts,
            edge_locks,
            hypergraph,
        })
    }

    /// Returns a shared handle to the underlying hypergraph.
    #[must_use]
    pub fn shared_hypergraph(&self) -> Arc<Hypergraph> {
        Arc::clone(&self.hypergraph)
    }

    /// Returns the current weight of block `b`.
    #[must_use]
    #[inline]
    pub fn part_weight(&self, b: BlockId) -> NodeWeight {
        self.part_weights[b as usize].load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all block weights.
    #[must_use]
    pub fn part_weights(&self) -> Vec<NodeWeight> {
        self.part_weights
            .iter()
            .map(|weight| weight.load(Ordering::Relaxed))
            .collect()
    }

    /// Returns a snapshot of the block assignment.
    #[must_use]
    pub fn assignment(&self) -> Vec<BlockId> {
        self.part_ids
            .iter()
            .map(|block| block.load(Ordering::Relaxed))
            .collect()
    }

    /// Returns the pin of the two-pin edge `e` that is not `u`.
    #[must_use]
    #[inline]
    pub fn edge_target(&self, e: EdgeId, u: NodeId) -> NodeId {
        self.hypergraph.edge_target(e, u)
    }

    /// Returns `true` when `u` has at least one incident cut edge.
    #[must_use]
    pub fn is_border_node(&self, u: NodeId) -> bool {
        self.hypergraph
            .incident_edges(u)
            .iter()
            .any(|&e| self.connectivity(e) > 1)
    }

    /// Moves `u` from `from` to `to` unless the weight of `to` would exceed
    /// `max_weight_to`.
    ///
    /// Weight in `to` is reserved first and given back on failure. On success
    /// `on_edge` observes one [`EdgeUpdate`] per incident edge, after the pin
    /// counts of that edge have been updated.
    pub fn change_node_part(
        &self,
        u: NodeId,
        from: BlockId,
        to: BlockId,
        max_weight_to: NodeWeight,
        mut on_edge: impl FnMut(&EdgeUpdate),
    ) -> bool {
        debug_assert_ne!(from, to, "a move must change the block");
        debug_assert_eq!(self.part_id(u), from, "node {u} is not in block {from}");

        let weight = self.hypergraph.node_weight(u);
        let to_weight = &self.part_weights[to as usize];
        if to_weight.fetch_add(weight, Ordering::Relaxed) + weight > max_weight_to {
            to_weight.fetch_sub(weight, Ordering::Relaxed);
            return false;
        }
        self.part_ids[u as usize].store(to, Ordering::Relaxed);
        self.part_weights[from as usize].fetch_sub(weight, Ordering::Relaxed);

        for &edge in self.hypergraph.incident_edges(u) {
            let (pin_count_in_from_after, pin_count_in_to_after) = {
                let _guard = self.edge_locks[edge as usize]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let from_after = self.pin_counts[self.pin_index(edge, from)]
                    .fetch_sub(1, Ordering::Relaxed)
                    - 1;
                let to_after = self.pin_counts[self.pin_index(edge, to)]
                    .fetch_add(1, Ordering::Relaxed)
                    + 1;
                (from_after, to_after)
            };
            on_edge(&EdgeUpdate {
                node: u,
                edge,
                edge_weight: self.hypergraph.edge_weight(edge),
                edge_size: self.hypergraph.edge_size(edge),
                from,
                to,
                pin_count_in_from_after,
                pin_count_in_to_after,
            });
        }
        true
    }

    /// Moves `u` like [`Self::change_node_part`] and keeps `gain_cache` in sync,
    /// including the moved node's own penalty entry.
    pub fn change_node_part_with_gain_cache_update<G: GainCache>(
        &self,
        u: NodeId,
        from: BlockId,
        to: BlockId,
        max_weight_to: NodeWeight,
        gain_cache: &G,
        mut on_edge: impl FnMut(&EdgeUpdate),
    ) -> bool {
        let moved = self.change_node_part(u, from, to, max_weight_to, |update| {
            on_edge(update);
            gain_cache.delta_gain_update(self, update);
        });
        if moved {
            gain_cache.recompute_penalty_entry(self, u);
        }
        moved
    }

    /// Recomputes block weights and pin counts from the block ids and
    /// compares them with the tracked values.
    #[must_use]
    pub fn check_tracked_partition_information(&self) -> bool {
        let mut weights = vec![0; self.k];
        for u in self.hypergraph.nodes() {
            weights[self.part_id(u) as usize] += self.hypergraph.node_weight(u);
        }
        if weights != self.part_weights() {
            return false;
        }
        self.hypergraph.edges().into_par_iter().all(|e| {
            let mut counts = vec![0_u32; self.k];
            for &pin in self.hypergraph.pins(e) {
                counts[self.part_id(pin) as usize] += 1;
            }
            counts
                .iter()
                .enumerate()
                .all(|(b, &count)| self.pin_count_in_part(e, b as BlockId) == count)
        })
    }

    #[inline]
    fn pin_index(&self, e: EdgeId, b: BlockId) -> usize {
        e as usize * self.k + b as usize
    }
}

impl PartitionView for PartitionedHypergraph {
    #[inline]
    fn hypergraph(&self) -> &Hypergraph {
        &self.hypergraph
    }

    #[inline]
    fn k(&self) -> usize {
        self.k
    }

    #[inline]
    fn part_id(&self, u: NodeId) -> BlockId {
        self.part_ids[u as usize].load(Ordering::Relaxed)
    }

    #[inline]
    fn pin_count_in_part(&self, e: EdgeId, b: BlockId) -> u32 {
        self.pin_counts[self.pin_index(e, b)].load(Ordering::Relaxed)
    }
}
