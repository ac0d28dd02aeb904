//! Cut gains for plain graphs: `k` entries per node.

use rayon::prelude::*;
use tracing::instrument;

use super::{GainCache, GainTable};
use crate::{
    error::{RefinementError, Result},
    hypergraph::{EdgeUpdate, PartitionView, PartitionedHypergraph},
    objective,
    types::{BlockId, Gain, NodeId},
};

/// Gain cache for the edge-cut objective on graphs.
///
/// Entry `(u, b)` holds the weight of edges from `u` to neighbours in block
/// `b`. The penalty of leaving a block is the entry toward that block, so a
/// move gains `w(u, to) - w(u, from)`.
///
/// Only inputs whose edges all have two pins are accepted.
#[derive(Clone, Debug)]
pub struct GraphCutGainCache {
    k: usize,
    table: GainTable,
    initialized: bool,
}

impl GraphCutGainCache {
    /// Allocates an uninitialised cache for `num_nodes` nodes and `k` blocks.
    #[must_use]
    pub fn new(num_nodes: usize, k: usize) -> Self {
        Self {
            k,
            table: GainTable::new(num_nodes * k),
            initialized: false,
        }
    }
}

impl GainCache for GraphCutGainCache {
    #[rustfmt::skip]
    fn k(&self) -> usize { self.k }

    #[instrument(name = "gain.graph_cut.initialize", skip_all, fields(nodes = phg.hypergraph().num_nodes()))]
    fn initialize(&mut self, phg: &PartitionedHypergraph) -> Result<()> {
        let hg = phg.hypergraph();
        if !hg.is_graph() {
            return Err(RefinementError::UnsupportedObjective {
                max_edge_size: hg.max_edge_size(),
            });
        }
        let required = hg.num_nodes() * phg.k();
        if phg.k() != self.k || self.table.len() != required {
            return Err(RefinementError::GainCacheMismatch {
                cache_entries: self.table.len(),
                required,
            });
        }

        let k = self.k;
        let table = &self.table;
        hg.nodes()
            .into_par_iter()
            .for_each_init(
                || vec![0; k],
                |weights, u| {
                    for &e in hg.incident_edges(u) {
                        let target = hg.edge_target(e, u);
                        weights[phg.part_id(target) as usize] += hg.edge_weight(e);
                    }
                    for (b, weight) in weights.iter_mut().enumerate() {
                        table.store(u as usize * k + b, *weight);
                        *weight = 0;
                    }
                },
            );
        self.initialized = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.table.zero();
        self.initialized = false;
    }

    #[rustfmt::skip]
    fn is_initialized(&self) -> bool { self.initialized }

    #[inline]
    fn benefit_index(&self, u: NodeId, to: BlockId) -> usize {
        u as usize * self.k + to as usize
    }

    #[inline]
    fn penalty_index(&self, u: NodeId, from: BlockId) -> usize {
        self.benefit_index(u, from)
    }

    #[inline]
    fn entry(&self, index: usize) -> Gain {
        self.table.load(index)
    }

    #[inline]
    fn add_to_entry(&self, index: usize, delta: Gain) {
        self.table.add(index, delta);
    }

    fn entry_updates<V: PartitionView + ?Sized>(
        &self,
        view: &V,
        update: &EdgeUpdate,
        mut sink: impl FnMut(usize, Gain),
    ) {
        let target = view.hypergraph().edge_target(update.edge, update.node);
        sink(self.benefit_index(target, update.from), -update.edge_weight);
        sink(self.benefit_index(target, update.to), update.edge_weight);
    }

    fn recompute_penalty_entry<V: PartitionView + ?Sized>(&self, _view: &V, _u: NodeId) {
        // A node's own entries depend only on its neighbours' blocks.
    }

    fn recompute_benefit_term<V: PartitionView + ?Sized>(
        &self,
        view: &V,
        u: NodeId,
        to: BlockId,
    ) -> Gain {
        let hg = view.hypergraph();
        hg.incident_edges(u)
            .iter()
            .filter(|&&e| view.part_id(hg.edge_target(e, u)) == to)
            .map(|&e| hg.edge_weight(e))
            .sum()
    }

    fn recompute_penalty_term<V: PartitionView + ?Sized>(
        &self,
        view: &V,
        u: NodeId,
        from: BlockId,
    ) -> Gain {
        self.recompute_benefit_term(view, u, from)
    }

    fn objective(phg: &PartitionedHypergraph) -> Gain {
        objective::cut(phg)
    }
}
