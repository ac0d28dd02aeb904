//! Flow-based refinement of a two-block region.
//!
//! The region is turned into a flow network whose terminals stand for the
//! rest of both blocks. A minimum cut of that network is a new bipartition of
//! the region; it is accepted when it lowers the cut, or keeps it and makes
//! the heavier block lighter, without breaking either block's weight limit.

mod network;
mod solver;

use std::time::{Duration, Instant};

use super::{
    construction::{ProblemStats, RegionLimit, Subproblem},
    quotient_graph::BlockPair,
};
use crate::{
    config::{FlowConfig, PartitionContext},
    hypergraph::{PartitionView, PartitionedHypergraph},
    types::{Gain, Move, NodeWeight},
};

pub use self::{
    network::{Capacity, FlowNetwork, FlowProblem, INFINITE_CAPACITY},
    solver::{EdmondsKarpSolver, FlowSolver},
};

/// Solver iterations between two wall-clock checks.
const TIME_CHECK_INTERVAL: usize = 25;

/// How a refinement attempt ended.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MoveSequenceState {
    /// The search finished; the sequence may still be empty.
    #[default]
    Success,
    /// The search ran out of time and its partial result was discarded.
    TimeLimit,
}

/// Moves proposed by one search, with the improvement it expects.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MoveSequence {
    /// Moves to apply, in order.
    pub moves: Vec<Move>,
    /// Objective reduction the search computed for the whole sequence.
    pub expected_improvement: Gain,
    /// Outcome of the search.
    pub state: MoveSequenceState,
}

/// Refines the bipartition of one region between `pair`.
#[derive(Debug)]
pub struct FlowRefiner<'a> {
    phg: &'a PartitionedHypergraph,
    context: &'a PartitionContext,
    pair: BlockPair,
    scaling: f64,
    time_limit: Duration,
}

impl<'a> FlowRefiner<'a> {
    /// Creates a refiner for the blocks of `pair`.
    #[must_use]
    pub fn new(
        phg: &'a PartitionedHypergraph,
        context: &'a PartitionContext,
        config: &FlowConfig,
        pair: BlockPair,
    ) -> Self {
        Self {
            phg,
            context,
            pair,
            scaling: 1.0 + config.alpha * context.epsilon(),
            time_limit: config.time_limit,
        }
    }

    /// Computes a minimum cut of the region and returns the moves realising
    /// it when the result is an improvement.
    ///
    /// `start` is when the search began; the time limit covers region
    /// construction as well as solving.
    pub fn refine<S: FlowSolver + ?Sized>(
        &self,
        subproblem: &Subproblem,
        solver: &mut S,
        start: Instant,
    ) -> MoveSequence {
        debug_assert_eq!(subproblem.pair, self.pair);
        let mut sequence = MoveSequence::default();
        let FlowProblem {
            mut network,
            nodes,
            total_cut,
            non_removable_cut,
            weight_of_block_0,
            weight_of_block_1,
        } = FlowProblem::build(self.phg, subproblem);
        if total_cut - non_removable_cut <= 0 {
            return sequence;
        }

        let mut iteration = 0;
        while solver.advance(&mut network) > 0 {
            if iteration % TIME_CHECK_INTERVAL == 0 && start.elapsed() > self.time_limit {
                sequence.state = MoveSequenceState::TimeLimit;
                return sequence;
            }
            iteration += 1;
        }
        let flow = network.flow_value();
        debug_assert!(flow <= total_cut - non_removable_cut);

        let (b0, b1) = (self.pair.block_0, self.pair.block_1);
        let limits = [
            weight_of_block_0.max(self.context.max_part_weight(b0)),
            weight_of_block_1.max(self.context.max_part_weight(b1)),
        ];
        let total_weight = weight_of_block_0 + weight_of_block_1;
        let mut candidates: Vec<(Vec<bool>, [NodeWeight; 2])> = [network.source_side(), network.largest_source_side()]
            .into_iter()
            .map(|side| {
                let weight_0: NodeWeight = (0..network.num_nodes())
                    .filter(|&v| side[v])
                    .map(|v| network.node_weight(v))
                    .sum();
                (side, [weight_0, total_weight - weight_0])
            })
            .collect();
        candidates.sort_by_key(|(_, weights)| weights[0].max(weights[1]));
        let Some((side, weights)) = candidates
            .into_iter()
            .find(|(_, weights)| weights[0] <= limits[0] && weights[1] <= limits[1])
        else {
            return sequence;
        };

        let new_cut = non_removable_cut + flow;
        let improved = new_cut < total_cut
            || (new_cut == total_cut && weights[0].max(weights[1]) < weight_of_block_0.max(weight_of_block_1));
        if improved {
            sequence.expected_improvement = total_cut - new_cut;
            sequence.moves = nodes
                .iter()
                .enumerate()
                .filter_map(|(i, &u)| {
                    let from = self.phg.part_id(u);
                    let to = if side[i + 2] { b0 } else { b1 };
                    (from != to).then(|| Move::new(u, from, to, 0))
                })
                .collect();
        }
        sequence
    }
}

impl RegionLimit for FlowRefiner<'_> {
    /// Locks a block once the region holds as much of it as the other block
    /// could absorb under the scaled limit.
    fn is_maximum_problem_size_reached(&self, stats: &mut ProblemStats) -> bool {
        let (b0, b1) = (self.pair.block_0, self.pair.block_1);
        let capacity_of = |b| {
            (self.scaling * self.context.perfect_balance_part_weight(b) as f64) as NodeWeight
                - self.phg.part_weight(b)
        };
        if stats.block_weight(b0) >= capacity_of(b1) {
            stats.lock_block(b0);
        }
        if stats.block_weight(b1) >= capacity_of(b0) {
            stats.lock_block(b1);
        }
        stats.is_locked(b0) && stats.is_locked(b1)
    }
}
