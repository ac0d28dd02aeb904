//! Concurrent refinement of block pairs on extracted regions.
//!
//! Every round snapshots the cut into a [`QuotientGraph`] and starts searches
//! on all cut block pairs. A search grows a region around the pair's cut
//! edges, hands it to a [`FlowRefiner`] and applies the resulting
//! [`MoveSequence`] if it still improves the partition once other searches
//! have applied theirs.

mod construction;
mod flow;
mod quotient_graph;

use std::{sync::Mutex, time::Instant};

use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::{
    config::{FlowConfig, PartitionContext, RefinementConfig},
    error::{RefinementError, Result},
    gain::{GainCache, objective_delta},
    hypergraph::{PartitionView, PartitionedHypergraph},
    objective,
    ownership::NodeOwnership,
    refiner::{Metrics, Refiner, ensure_initialized},
    types::{BlockId, Gain, NodeWeight},
};

pub use self::{
    construction::{ProblemConstruction, ProblemStats, RegionLimit, Subproblem},
    flow::{
        Capacity, EdmondsKarpSolver, FlowNetwork, FlowProblem, FlowRefiner, FlowSolver,
        INFINITE_CAPACITY, MoveSequence, MoveSequenceState,
    },
    quotient_graph::{BlockPair, QuotientGraph},
};

/// Runs flow searches on all cut block pairs and applies their results.
#[derive(Debug)]
pub struct FlowRefinementScheduler {
    config: FlowConfig,
    context: PartitionContext,
    ownership: NodeOwnership,
    apply_lock: Mutex<()>,
}

impl FlowRefinementScheduler {
    /// Allocates node ownership tags for refining `phg`.
    #[must_use]
    pub fn new(phg: &PartitionedHypergraph, config: &RefinementConfig) -> Self {
        Self {
            config: config.flows().clone(),
            context: PartitionContext::for_partition(phg, config.epsilon()),
            ownership: NodeOwnership::new(phg.hypergraph().num_nodes()),
            apply_lock: Mutex::new(()),
        }
    }

    /// Replaces the balance context derived from the configuration.
    #[must_use]
    pub fn with_context(mut self, context: PartitionContext) -> Self {
        self.context = context;
        self
    }

    /// Returns the balance context applied sequences must respect.
    #[must_use]
    #[rustfmt::skip]
    pub fn context(&self) -> &PartitionContext { &self.context }

    /// Applies `sequence` to `phg` with gain-cache updates.
    ///
    /// The improvement is attributed from the pin counts each move leaves
    /// behind, so it reflects moves other searches applied in the meantime.
    /// Moves whose node has left its source block are skipped and marked
    /// invalid. If the attributed improvement is negative, or a touched block
    /// ends above both its limit and its weight before the sequence, every
    /// applied move is reverted and `None` is returned.
    ///
    /// # Errors
    /// Returns [`RefinementError::LockPoisoned`] when a search panicked while
    /// applying its own sequence.
    pub fn apply_move_sequence<G: GainCache>(
        &self,
        phg: &PartitionedHypergraph,
        gain_cache: &G,
        sequence: &mut MoveSequence,
    ) -> Result<Option<Gain>> {
        let _guard = self
            .apply_lock
            .lock()
            .map_err(|_| RefinementError::LockPoisoned {
                resource: "move sequence mutex",
            })?;

        let weights_before: Vec<(BlockId, NodeWeight)> = sequence
            .moves
            .iter()
            .flat_map(|mv| [mv.from, mv.to])
            .map(|b| (b, phg.part_weight(b)))
            .collect();

        let mut improvement = 0;
        for mv in &mut sequence.moves {
            if phg.part_id(mv.node) != mv.from {
                mv.invalidate();
                continue;
            }
            let mut attributed = 0;
            phg.change_node_part_with_gain_cache_update(
                mv.node,
                mv.from,
                mv.to,
                NodeWeight::MAX,
                gain_cache,
                |update| attributed -= objective_delta(update),
            );
            mv.gain = attributed;
            improvement += attributed;
        }

        let violates_balance = weights_before.iter().any(|&(b, before)| {
            let weight = phg.part_weight(b);
            weight > before && weight > self.context.max_part_weight(b)
        });
        if improvement < 0 || violates_balance {
            for mv in sequence.moves.iter().rev().filter(|mv| mv.is_valid()) {
                phg.change_node_part_with_gain_cache_update(
                    mv.node,
                    mv.to,
                    mv.from,
                    NodeWeight::MAX,
                    gain_cache,
                    |_| {},
                );
            }
            debug!(
                improvement,
                expected = sequence.expected_improvement,
                violates_balance,
                "move sequence reverted"
            );
            return Ok(None);
        }
        Ok(Some(improvement))
    }

    /// Runs searches on `pair` until its cut edges are used up or a search
    /// finds nothing to refine.
    fn refine_block_pair<G: GainCache>(
        &self,
        phg: &PartitionedHypergraph,
        gain_cache: &G,
        quotient_graph: &QuotientGraph,
        pair: BlockPair,
    ) -> Result<Gain> {
        let construction = ProblemConstruction::new(phg, &self.ownership, &self.config);
        let refiner = FlowRefiner::new(phg, &self.context, &self.config, pair);
        let mut improvement = 0;
        loop {
            let start = Instant::now();
            let search = quotient_graph.register_search(pair);
            let Some(subproblem) = construction.construct(search, quotient_graph, &refiner) else {
                quotient_graph.finalize_search(search);
                break;
            };
            let mut sequence = refiner.refine(&subproblem, &mut EdmondsKarpSolver::default(), start);
            let applied = match sequence.state {
                MoveSequenceState::TimeLimit => {
                    record_flow_time_limit();
                    warn!(
                        search,
                        block_0 = pair.block_0,
                        block_1 = pair.block_1,
                        region = subproblem.nodes.len(),
                        "flow search hit its time limit"
                    );
                    Ok(None)
                }
                MoveSequenceState::Success if sequence.moves.is_empty() => Ok(None),
                MoveSequenceState::Success => self.apply_move_sequence(phg, gain_cache, &mut sequence),
            };
            construction.release_nodes(search, &subproblem);
            quotient_graph.finalize_search(search);
            record_flow_search();

            let gain = applied?.unwrap_or(0);
            improvement += gain;
            debug!(
                search,
                block_0 = pair.block_0,
                block_1 = pair.block_1,
                region = subproblem.nodes.len(),
                expected = sequence.expected_improvement,
                gain,
                "flow search finished"
            );
            if subproblem.nodes.is_empty() || quotient_graph.num_remaining_cut_edges(pair) == 0 {
                break;
            }
        }
        Ok(improvement)
    }
}

impl<G: GainCache> Refiner<G> for FlowRefinementScheduler {
    #[instrument(name = "flows.refine", skip_all, fields(k = phg.k()))]
    fn refine(
        &mut self,
        phg: &PartitionedHypergraph,
        gain_cache: &mut G,
        metrics: &mut Metrics,
    ) -> Result<bool> {
        ensure_initialized(phg, gain_cache)?;
        let gain_cache: &G = gain_cache;

        let mut improvement = 0;
        for round in 0..self.config.max_rounds {
            let quotient_graph = QuotientGraph::new(phg);
            let pairs = quotient_graph.block_pairs();
            if pairs.is_empty() {
                break;
            }
            let gain: Gain = pairs
                .par_iter()
                .map(|&pair| self.refine_block_pair(phg, gain_cache, &quotient_graph, pair))
                .try_reduce(|| 0, |a, b| Ok(a + b))?;
            debug!(round, pairs = pairs.len(), gain, "flow round finished");
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

#[cfg(feature = "metrics")]
fn record_flow_search() {
    metrics::counter!("tessera_flow_searches").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_flow_search() {}

#[cfg(feature = "metrics")]
fn record_flow_time_limit() {
    metrics::counter!("tessera_flow_time_limits").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_flow_time_limit() {}
