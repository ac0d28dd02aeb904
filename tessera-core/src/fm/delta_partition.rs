//! Speculative partition view private to one localized search.

use std::collections::HashMap;

use crate::{
    hypergraph::{EdgeUpdate, Hypergraph, PartitionView, PartitionedHypergraph},
    types::{BlockId, EdgeId, NodeId, NodeWeight},
};

/// Thread-local speculative partition layered over the shared one.
///
/// Holds block-id overrides plus pin-count and block-weight deltas, so a
/// search can evaluate a move sequence without publishing it.
#[derive(Debug)]
pub(crate) struct DeltaPartition<'a> {
    phg: &'a PartitionedHypergraph,
    part_ids: HashMap<NodeId, BlockId>,
    pin_count_deltas: HashMap<usize, i64>,
    part_weight_deltas: Vec<NodeWeight>,
}

impl<'a> DeltaPartition<'a> {
    pub(crate) fn new(phg: &'a PartitionedHypergraph) -> Self {
        Self {
            phg,
            part_ids: HashMap::new(),
            pin_count_deltas: HashMap::new(),
            part_weight_deltas: vec![0; phg.k()],
        }
    }

    pub(crate) fn part_weight(&self, b: BlockId) -> NodeWeight {
        self.phg.part_weight(b) + self.part_weight_deltas[b as usize]
    }

    /// Moves `u` locally and appends one [`EdgeUpdate`] per incident edge.
    pub(crate) fn change_node_part(
        &mut self,
        u: NodeId,
        from: BlockId,
        to: BlockId,
        updates: &mut Vec<EdgeUpdate>,
    ) {
        debug_assert_eq!(self.part_id(u), from);
        let hg = self.phg.hypergraph();
        let weight = hg.node_weight(u);
        self.part_ids.insert(u, to);
        self.part_weight_deltas[from as usize] -= weight;
        self.part_weight_deltas[to as usize] += weight;

        let k = self.phg.k();
        for &edge in hg.incident_edges(u) {
            *self.pin_count_deltas.entry(edge as usize * k + from as usize).or_insert(0) -= 1;
            *self.pin_count_deltas.entry(edge as usize * k + to as usize).or_insert(0) += 1;
            updates.push(EdgeUpdate {
                node: u,
                edge,
                edge_weight: hg.edge_weight(edge),
                edge_size: hg.edge_size(edge),
                from,
                to,
                pin_count_in_from_after: self.pin_count_in_part(edge, from),
                pin_count_in_to_after: self.pin_count_in_part(edge, to),
            });
        }
    }
}

impl PartitionView for DeltaPartition<'_> {
    fn hypergraph(&self) -> &Hypergraph {
        self.phg.hypergraph()
    }

    fn k(&self) -> usize {
        self.phg.k()
    }

    fn part_id(&self, u: NodeId) -> BlockId {
        self.part_ids
            .get(&u)
            .copied()
            .unwrap_or_else(|| self.phg.part_id(u))
    }

    fn pin_count_in_part(&self, e: EdgeId, b: BlockId) -> u32 {
        let index = e as usize * self.phg.k() + b as usize;
        let delta = self.pin_count_deltas.get(&index).copied().unwrap_or(0);
        let count = i64::from(self.phg.pin_count_in_part(e, b)) + delta;
        // Every negative delta stems from a node this search owns, which the
        // shared count still includes.
        debug_assert!(count >= 0, "negative speculative pin count for edge {e} in block {b}");
        count.max(0) as u32
    }
}
