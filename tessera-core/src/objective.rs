//! Objective and balance functions evaluated on a partition.

use rayon::prelude::*;

use crate::{
    config::PartitionContext,
    hypergraph::{PartitionView, PartitionedHypergraph},
    types::{BlockId, Gain},
};

/// Total weight of edges with pins in more than one block.
#[must_use]
pub fn cut(phg: &PartitionedHypergraph) -> Gain {
    let hg = phg.hypergraph();
    hg.edges()
        .into_par_iter()
        .filter(|&e| phg.connectivity(e) > 1)
        .map(|e| hg.edge_weight(e))
        .sum()
}

/// Connectivity objective: `sum(w(e) * (λ(e) - 1))`.
#[must_use]
pub fn km1(phg: &PartitionedHypergraph) -> Gain {
    let hg = phg.hypergraph();
    hg.edges()
        .into_par_iter()
        .map(|e| hg.edge_weight(e) * (phg.connectivity(e) as Gain - 1))
        .sum()
}

/// Largest relative overload `weight(b) / perfect(b) - 1` over all blocks.
#[must_use]
pub fn imbalance(phg: &PartitionedHypergraph, ctx: &PartitionContext) -> f64 {
    (0..phg.k() as BlockId)
        .map(|b| phg.part_weight(b) as f64 / ctx.perfect_balance_part_weight(b) as f64 - 1.0)
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Returns `true` when no block exceeds its weight limit.
#[must_use]
pub fn is_balanced(phg: &PartitionedHypergraph, ctx: &PartitionContext) -> bool {
    (0..phg.k() as BlockId).all(|b| phg.part_weight(b) <= ctx.max_part_weight(b))
}
