//! Connectivity (`λ − 1`) gains for hypergraphs: `k + 1` entries per node.

use rayon::prelude::*;
use tracing::instrument;

use super::{GainCache, GainTable};
use crate::{
    error::{RefinementError, Result},
    hypergraph::{EdgeUpdate, PartitionView, PartitionedHypergraph},
    objective,
    types::{BlockId, Gain, NodeId},
};

/// Gain cache for the connectivity objective.
///
/// Each node owns one penalty slot followed by `k` benefit slots:
///
/// - `p(u)` is the weight of incident edges with another pin in `u`'s block,
///   which stay connected to that block when `u` leaves;
/// - `b(u, t)` is the weight of incident edges that already have a pin in `t`.
///
/// Moving `u` to `t` gains `b(u, t) - p(u)`.
#[derive(Clone, Debug)]
pub struct Km1GainCache {
    k: usize,
    table: GainTable,
    initialized: bool,
}

impl Km1GainCache {
    /// Allocates an uninitialised cache for `num_nodes` nodes and `k` blocks.
    #[must_use]
    pub fn new(num_nodes: usize, k: usize) -> Self {
        Self {
            k,
            table: GainTable::new(num_nodes * (k + 1)),
            initialized: false,
        }
    }

    fn penalty_of<V: PartitionView + ?Sized>(view: &V, u: NodeId) -> Gain {
        let hg = view.hypergraph();
        let block = view.part_id(u);
        hg.incident_edges(u)
            .iter()
            .filter(|&&e| view.pin_count_in_part(e, block) > 1)
            .map(|&e| hg.edge_weight(e))
            .sum()
    }
}

impl GainCache for Km1GainCache {
    #[rustfmt::skip]
    fn k(&self) -> usize { self.k }

    #[instrument(name = "gain.km1.initialize", skip_all, fields(nodes = phg.hypergraph().num_nodes()))]
    fn initialize(&mut self, phg: &PartitionedHypergraph) -> Result<()> {
        let hg = phg.hypergraph();
        let required = hg.num_nodes() * (phg.k() + 1);
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
                |benefits, u| {
                    let own = phg.part_id(u);
                    let mut penalty = 0;
                    for &e in hg.incident_edges(u) {
                        let weight = hg.edge_weight(e);
                        if phg.pin_count_in_part(e, own) > 1 {
                            penalty += weight;
                        }
                        for (b, benefit) in benefits.iter_mut().enumerate() {
                            if phg.pin_count_in_part(e, b as BlockId) > 0 {
                                *benefit += weight;
                            }
                        }
                    }
                    let base = u as usize * (k + 1);
                    table.store(base, penalty);
                    for (b, benefit) in benefits.iter_mut().enumerate() {
                        table.store(base + 1 + b, *benefit);
                        *benefit = 0;
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
        u as usize * (self.k + 1) + 1 + to as usize
    }

    #[inline]
    fn penalty_index(&self, u: NodeId, _from: BlockId) -> usize {
        u as usize * (self.k + 1)
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
        let EdgeUpdate {
            edge,
            edge_weight,
            from,
            to,
            ..
        } = *update;
        let pins = view.hypergraph().pins(edge);

        match update.pin_count_in_from_after {
            1 => {
                for &pin in pins.iter().filter(|&&pin| view.part_id(pin) == from) {
                    sink(self.penalty_index(pin, from), -edge_weight);
                }
            }
            0 => {
                for &pin in pins {
                    sink(self.benefit_index(pin, from), -edge_weight);
                }
            }
            _ => {}
        }

        match update.pin_count_in_to_after {
            1 => {
                for &pin in pins {
                    sink(self.benefit_index(pin, to), edge_weight);
                }
            }
            2 => {
                for &pin in pins.iter().filter(|&&pin| view.part_id(pin) == to) {
                    sink(self.penalty_index(pin, to), edge_weight);
                }
            }
            _ => {}
        }
    }

    fn recompute_penalty_entry<V: PartitionView + ?Sized>(&self, view: &V, u: NodeId) {
        self.table
            .store(self.penalty_index(u, view.part_id(u)), Self::penalty_of(view, u));
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
            .filter(|&&e| view.pin_count_in_part(e, to) > 0)
            .map(|&e| hg.edge_weight(e))
            .sum()
    }

    fn recompute_penalty_term<V: PartitionView + ?Sized>(
        &self,
        view: &V,
        u: NodeId,
        _from: BlockId,
    ) -> Gain {
        Self::penalty_of(view, u)
    }

    fn objective(phg: &PartitionedHypergraph) -> Gain {
        objective::km1(phg)
    }
}
