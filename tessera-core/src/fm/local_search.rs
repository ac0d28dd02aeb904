//! One localized FM search: speculate from a handful of seeds, then publish
//! the best prefix.

use std::collections::{BinaryHeap, HashSet};

use tracing::trace;

use super::{delta_partition::DeltaPartition, move_tracker::GlobalMoveTracker};
use crate::{
    config::FmConfig,
    gain::{DeltaGainCache, GainCache},
    hypergraph::{EdgeUpdate, PartitionView, PartitionedHypergraph},
    ownership::NodeOwnership,
    types::{BlockId, Gain, Move, MoveId, NodeId, NodeWeight, SearchId},
};

/// What a search published to the shared partition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct SearchOutcome {
    pub(crate) committed_moves: usize,
    pub(crate) expected_gain: Gain,
    /// Moves that took a slot in the move log, reverted ones included.
    pub(crate) logged_moves: usize,
}

/// Shared state every localized search of one round reads or appends to.
pub(crate) struct LocalizedSearch<'a, G> {
    pub(crate) phg: &'a PartitionedHypergraph,
    pub(crate) gain_cache: &'a G,
    pub(crate) ownership: &'a NodeOwnership,
    pub(crate) tracker: &'a GlobalMoveTracker,
    pub(crate) max_part_weights: &'a [NodeWeight],
    pub(crate) config: &'a FmConfig,
}

/// Thread-local speculation state of one search.
struct SearchState<'a, G> {
    search: SearchId,
    partition: DeltaPartition<'a>,
    cache: DeltaGainCache<'a, G>,
    queue: BinaryHeap<(Gain, BlockId, NodeId)>,
    claimed: Vec<NodeId>,
    moved: HashSet<NodeId>,
    updates: Vec<EdgeUpdate>,
}

impl<'a, G: GainCache> LocalizedSearch<'a, G> {
    /// Runs one search from `seeds` and commits its best local prefix.
    ///
    /// Nodes the search claimed but did not move are released afterwards;
    /// moved nodes stay claimed until the round ends.
    pub(crate) fn run(&self, search: SearchId, seeds: &[NodeId]) -> SearchOutcome {
        let mut state = SearchState {
            search,
            partition: DeltaPartition::new(self.phg),
            cache: DeltaGainCache::new(self.gain_cache),
            queue: BinaryHeap::new(),
            claimed: Vec::new(),
            moved: HashSet::new(),
            updates: Vec::new(),
        };
        for &seed in seeds {
            self.claim(&mut state, seed);
        }

        let mut local_moves: Vec<Move> = Vec::new();
        let (mut gain_sum, mut best_gain, mut best_len, mut fruitless) = (0, 0, 0, 0);
        while let Some((gain, to, u)) = state.queue.pop() {
            if state.moved.contains(&u) {
                continue;
            }
            let Some(current) = self.best_move(&state, u) else {
                continue;
            };
            if current != (gain, to) {
                state.queue.push((current.0, current.1, u));
                continue;
            }

            let from = state.partition.part_id(u);
            state.updates.clear();
            state.partition.change_node_part(u, from, to, &mut state.updates);
            for update in &state.updates {
                state.cache.delta_gain_update(&state.partition, update);
            }
            state.cache.recompute_penalty_entry(&state.partition, u);
            state.moved.insert(u);
            local_moves.push(Move::new(u, from, to, gain));

            gain_sum += gain;
            if gain_sum > best_gain {
                best_gain = gain_sum;
                best_len = local_moves.len();
                fruitless = 0;
            } else {
                fruitless += 1;
                if fruitless >= self.config.max_fruitless_moves {
                    break;
                }
            }

            let touched: Vec<EdgeUpdate> = std::mem::take(&mut state.updates);
            for update in &touched {
                for &v in self.phg.hypergraph().pins(update.edge) {
                    if !state.moved.contains(&v) {
                        self.claim(&mut state, v);
                    }
                }
            }
            state.updates = touched;
        }

        let outcome = self.publish(search, &state.claimed, &local_moves[..best_len], best_gain);
        trace!(
            search,
            seeds = seeds.len(),
            speculated = local_moves.len(),
            committed = outcome.committed_moves,
            gain = outcome.expected_gain,
            "localized search finished"
        );
        outcome
    }

    /// Commits `prefix` and releases the claimed nodes that did not reach the
    /// move log.
    ///
    /// Nodes of a rejected commit whose reverted moves were logged stay
    /// claimed as well: each node takes at most one log slot per round.
    pub(super) fn publish(
        &self,
        search: SearchId,
        claimed: &[NodeId],
        prefix: &[Move],
        expected_gain: Gain,
    ) -> SearchOutcome {
        let outcome = self.commit(prefix, expected_gain);
        let logged: HashSet<NodeId> = prefix[..outcome.logged_moves]
            .iter()
            .map(|mv| mv.node)
            .collect();
        for &u in claimed.iter().filter(|u| !logged.contains(u)) {
            self.ownership.release(u, search);
        }
        outcome
    }

    /// Claims `u` if it is free and queues its best move; nodes the search
    /// already owns are re-queued with their current gain.
    fn claim(&self, state: &mut SearchState<'a, G>, u: NodeId) {
        let owned = self.ownership.owner(u) == Some(state.search);
        if !owned {
            if !self.ownership.try_acquire(u, state.search) {
                return;
            }
            state.claimed.push(u);
        }
        if let Some((gain, to)) = self.best_move(state, u) {
            state.queue.push((gain, to, u));
        }
    }

    /// Highest-gain feasible target of `u`; ties go to the lower block id.
    fn best_move(&self, state: &SearchState<'a, G>, u: NodeId) -> Option<(Gain, BlockId)> {
        let from = state.partition.part_id(u);
        let weight = self.phg.hypergraph().node_weight(u);
        (0..self.phg.k() as BlockId)
            .filter(|&to| to != from)
            .filter(|&to| {
                state.partition.part_weight(to) + weight <= self.max_part_weights[to as usize]
            })
            .map(|to| (state.cache.gain(u, from, to), to))
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
    }

    /// Publishes `moves` to the shared partition. If a block limit rejects a
    /// move, the already published part of the prefix is reverted and
    /// invalidated in the tracker.
    fn commit(&self, moves: &[Move], expected_gain: Gain) -> SearchOutcome {
        let mut ids: Vec<MoveId> = Vec::with_capacity(moves.len());
        for mv in moves {
            let applied = self.phg.change_node_part_with_gain_cache_update(
                mv.node,
                mv.from,
                mv.to,
                self.max_part_weights[mv.to as usize],
                self.gain_cache,
                |_| {},
            );
            if !applied {
                for &id in ids.iter().rev() {
                    let done = self.tracker.get_move(id);
                    self.phg.change_node_part_with_gain_cache_update(
                        done.node,
                        done.to,
                        done.from,
                        NodeWeight::MAX,
                        self.gain_cache,
                        |_| {},
                    );
                    self.tracker.invalidate(id);
                }
                return SearchOutcome {
                    logged_moves: ids.len(),
                    ..SearchOutcome::default()
                };
            }
            ids.push(self.tracker.insert_move(*mv));
        }
        SearchOutcome {
            committed_moves: moves.len(),
            expected_gain,
            logged_moves: moves.len(),
        }
    }
}
