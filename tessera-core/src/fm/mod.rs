//! Localized Fiduccia-Mattheyses refinement with global rollback.
//!
//! A round seeds many small searches from the border nodes of the partition.
//! Searches run concurrently, speculate privately and publish only their best
//! prefix; the published moves land in a [`GlobalMoveTracker`]. When every
//! search of the round has finished, [`GlobalRollback`] replaces the
//! speculative gains with true ones and keeps the best balanced prefix.

mod delta_partition;
mod local_search;
mod move_tracker;
mod rollback;
mod scan;

use std::sync::atomic::{AtomicU32, Ordering};

use rand::{SeedableRng, rngs::SmallRng, seq::SliceRandom};
use rayon::prelude::*;
use tracing::{debug, instrument};

use self::local_search::LocalizedSearch;
use crate::{
    config::{FmConfig, PartitionContext, RefinementConfig},
    error::Result,
    gain::GainCache,
    hypergraph::{PartitionView, PartitionedHypergraph},
    objective,
    ownership::NodeOwnership,
    refiner::{Metrics, Refiner, ensure_initialized},
    types::{Gain, NodeId, NodeWeight, SearchId},
};

pub use self::{move_tracker::GlobalMoveTracker, rollback::GlobalRollback, scan::GainIndex};

/// Multi-round localized FM refiner.
#[derive(Debug)]
pub struct FmRefiner {
    config: FmConfig,
    context: PartitionContext,
    tracker: GlobalMoveTracker,
    rollback: GlobalRollback,
    ownership: NodeOwnership,
    rng: SmallRng,
}

impl FmRefiner {
    /// Allocates per-node and per-pin state for refining `phg`.
    #[must_use]
    pub fn new(phg: &PartitionedHypergraph, config: &RefinementConfig) -> Self {
        let hg = phg.hypergraph();
        Self {
            config: config.fm().clone(),
            context: PartitionContext::for_partition(phg, config.epsilon()),
            tracker: GlobalMoveTracker::new(hg.num_nodes()),
            rollback: GlobalRollback::new(hg, phg.k(), config.fm().rollback_strategy),
            ownership: NodeOwnership::new(hg.num_nodes()),
            rng: SmallRng::seed_from_u64(config.fm().rng_seed),
        }
    }

    /// Replaces the balance context derived from the configuration.
    #[must_use]
    pub fn with_context(mut self, context: PartitionContext) -> Self {
        self.context = context;
        self
    }

    /// Returns the balance context the searches respect.
    #[must_use]
    #[rustfmt::skip]
    pub fn context(&self) -> &PartitionContext { &self.context }

    #[instrument(name = "fm.round", skip_all, fields(round = round))]
    fn round<G: GainCache>(
        &mut self,
        round: usize,
        phg: &PartitionedHypergraph,
        gain_cache: &G,
        rollback_limits: &[NodeWeight],
    ) -> Gain {
        let mut seeds: Vec<NodeId> = phg
            .hypergraph()
            .nodes()
            .into_par_iter()
            .filter(|&u| phg.is_border_node(u))
            .collect();
        if seeds.is_empty() {
            return 0;
        }
        seeds.shuffle(&mut self.rng);

        let next_search = AtomicU32::new(0);
        let search = LocalizedSearch {
            phg,
            gain_cache,
            ownership: &self.ownership,
            tracker: &self.tracker,
            max_part_weights: self.context.max_part_weights(),
            config: &self.config,
        };
        let committed: usize = seeds
            .par_chunks(self.config.num_seed_nodes)
            .map(|batch| {
                let id: SearchId = next_search.fetch_add(1, Ordering::Relaxed);
                search.run(id, batch).committed_moves
            })
            .sum();

        let gain = self
            .rollback
            .revert_to_best_prefix(phg, gain_cache, &mut self.tracker, rollback_limits);
        self.ownership.reset();
        debug!(
            border_nodes = seeds.len(),
            searches = next_search.load(Ordering::Relaxed),
            committed,
            gain,
            "fm round finished"
        );
        gain
    }
}

impl<G: GainCache> Refiner<G> for FmRefiner {
    #[instrument(name = "fm.refine", skip_all, fields(k = phg.k()))]
    fn refine(
        &mut self,
        phg: &PartitionedHypergraph,
        gain_cache: &mut G,
        metrics: &mut Metrics,
    ) -> Result<bool> {
        ensure_initialized(phg, gain_cache)?;
        self.rollback.set_remaining_original_pins(phg);
        let rollback_limits = self
            .context
            .scaled_max_part_weights(self.config.rollback_balance_violation_factor);

        let mut improvement = 0;
        for round in 0..self.config.max_rounds {
            let gain = self.round(round, phg, &*gain_cache, &rollback_limits);
            improvement += gain;
            if gain <= 0 {
                break;
            }
        }

        metrics.objective -= improvement;
        metrics.imbalance = objective::imbalance(phg, &self.context);
        Ok(improvement > 0)
    }
}

#[cfg(test)]
mod tests;
