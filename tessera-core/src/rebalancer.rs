//! Greedy repair of overloaded blocks.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::{
    config::{PartitionContext, RefinementConfig},
    error::Result,
    gain::{GainCache, objective_delta},
    hypergraph::{PartitionView, PartitionedHypergraph},
    objective,
    refiner::{Metrics, Refiner, ensure_initialized},
    types::{BlockId, Gain, Move, NodeId},
};

/// Moves nodes out of blocks above their weight limit.
///
/// Candidates of an overloaded block are visited in order of decreasing gain
/// (ties by node id). Each candidate's target is chosen again right before it
/// moves, so it reflects the moves made so far.
#[derive(Clone, Debug)]
pub struct Rebalancer {
    context: PartitionContext,
}

impl Rebalancer {
    /// Creates a rebalancer enforcing the limits derived from `config`.
    #[must_use]
    pub fn new(phg: &PartitionedHypergraph, config: &RefinementConfig) -> Self {
        Self {
            context: PartitionContext::for_partition(phg, config.epsilon()),
        }
    }

    /// Replaces the balance context derived from the configuration.
    #[must_use]
    pub fn with_context(mut self, context: PartitionContext) -> Self {
        self.context = context;
        self
    }

    /// Returns the limits being enforced.
    #[must_use]
    #[rustfmt::skip]
    pub fn context(&self) -> &PartitionContext { &self.context }

    /// Repairs every overloaded block as far as feasible moves allow and
    /// returns the objective improvement, usually negative.
    #[instrument(name = "rebalancer.rebalance", skip_all, fields(k = phg.k()))]
    pub fn rebalance<G: GainCache>(&self, phg: &PartitionedHypergraph, gain_cache: &G) -> Gain {
        let mut improvement = 0;
        let mut moved = 0_usize;
        for b in 0..phg.k() as BlockId {
            if !self.is_overloaded(phg, b) {
                continue;
            }
            let mut candidates: Vec<Move> = phg
                .hypergraph()
                .nodes()
                .into_par_iter()
                .filter(|&u| phg.part_id(u) == b)
                .filter_map(|u| self.best_move(phg, gain_cache, u))
                .collect();
            candidates.sort_unstable_by(|x, y| y.gain.cmp(&x.gain).then(x.node.cmp(&y.node)));

            for candidate in candidates {
                if !self.is_overloaded(phg, b) {
                    break;
                }
                let Some(mv) = self.best_move(phg, gain_cache, candidate.node) else {
                    continue;
                };
                let mut delta = 0;
                if phg.change_node_part_with_gain_cache_update(
                    mv.node,
                    mv.from,
                    mv.to,
                    self.context.max_part_weight(mv.to),
                    gain_cache,
                    |update| delta -= objective_delta(update),
                ) {
                    improvement += delta;
                    moved += 1;
                }
            }
        }
        debug!(
            moved,
            improvement,
            balanced = objective::is_balanced(phg, &self.context),
            "rebalancing finished"
        );
        improvement
    }

    fn is_overloaded(&self, phg: &PartitionedHypergraph, b: BlockId) -> bool {
        phg.part_weight(b) > self.context.max_part_weight(b)
    }

    /// Highest-gain move of `u` into a block with room for it; ties go to the
    /// lower block id.
    fn best_move<G: GainCache>(&self, phg: &PartitionedHypergraph, gain_cache: &G, u: NodeId) -> Option<Move> {
        let from = phg.part_id(u);
        let weight = phg.hypergraph().node_weight(u);
        (0..phg.k() as BlockId)
            .filter(|&to| to != from && phg.part_weight(to) + weight <= self.context.max_part_weight(to))
            .map(|to| Move::new(u, from, to, gain_cache.gain(u, from, to)))
            .max_by(|x, y| x.gain.cmp(&y.gain).then(y.to.cmp(&x.to)))
    }
}

impl<G: GainCache> Refiner<G> for Rebalancer {
    fn refine(
        &mut self,
        phg: &PartitionedHypergraph,
        gain_cache: &mut G,
        metrics: &mut Metrics,
    ) -> Result<bool> {
        ensure_initialized(phg, gain_cache)?;
        let improvement = self.rebalance(phg, &*gain_cache);
        metrics.objective -= improvement;
        metrics.imbalance = objective::imbalance(phg, &self.context);
        Ok(improvement > 0)
    }
}
