//! Consolidation of the global move log into its best balanced prefix.
//!
//! Gains recorded during localized search are speculative: concurrent
//! searches interleave, so a committed move's true effect depends on moves
//! other workers committed around it. Rollback recomputes true gains, keeps
//! the prefix with the highest gain that never leaves a block above its
//! limit, and reverts everything after it. Two interchangeable algorithms are
//! provided and must agree on the kept prefix and the reported gain.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;
use tracing::{debug, instrument};

use super::{
    move_tracker::GlobalMoveTracker,
    scan::{BalanceAndBestIndexScan, GainIndex},
};
use crate::{
    config::RollbackStrategy,
    gain::GainCache,
    hypergraph::{Hypergraph, PartitionView, PartitionedHypergraph},
    types::{BlockId, EdgeId, Gain, Move, MoveId, NodeWeight},
};

/// Reverts the global move log to its best balanced prefix.
///
/// For edges with more than two pins the parallel algorithm keeps, per
/// `(edge, block)`:
///
/// - the number of pins present at the start of the phase that have not
///   moved out yet;
/// - the ID of the first move into the block;
/// - the ID of the last move out of the block.
///
/// These counters must match the partition when a phase starts; call
/// [`GlobalRollback::set_remaining_original_pins`] once before the first phase.
#[derive(Debug)]
pub struct GlobalRollback {
    k: usize,
    strategy: RollbackStrategy,
    remaining_original_pins: Vec<AtomicU32>,
    first_move_in: Vec<AtomicU32>,
    last_move_out: Vec<AtomicU32>,
}

impl GlobalRollback {
    /// Allocates rollback state for `hypergraph` split into `k` blocks.
    #[must_use]
    pub fn new(hypergraph: &Hypergraph, k: usize, strategy: RollbackStrategy) -> Self {
        let len = if hypergraph.is_graph() { 0 } else { hypergraph.num_edges() * k };
        let zeroed = || (0..len).map(|_| AtomicU32::new(0)).collect::<Vec<_>>();
        Self {
            k,
            strategy,
            remaining_original_pins: zeroed(),
            first_move_in: zeroed(),
            last_move_out: zeroed(),
        }
    }

    /// Returns the configured strategy.
    #[must_use]
    #[rustfmt::skip]
    pub fn strategy(&self) -> RollbackStrategy { self.strategy }

    /// Snapshots the pin counts of `phg` as the phase's original pins.
    pub fn set_remaining_original_pins(&self, phg: &PartitionedHypergraph) {
        if self.remaining_original_pins.is_empty() {
            return;
        }
        let hg = phg.hypergraph();
        hg.edges()
            .into_par_iter()
            .filter(|&e| hg.edge_size(e) > 2)
            .for_each(|e| {
                for b in 0..self.k as BlockId {
                    self.remaining_original_pins[self.index(e, b)]
                        .store(phg.pin_count_in_part(e, b), Ordering::Relaxed);
                }
            });
    }

    /// Keeps the best balanced prefix of the tracker's moves, reverts the
    /// rest, ends the tracker's phase and returns the kept gain.
    ///
    /// `max_part_weights` are the limits the kept prefix must respect.
    pub fn revert_to_best_prefix<G: GainCache>(
        &mut self,
        phg: &PartitionedHypergraph,
        gain_cache: &G,
        tracker: &mut GlobalMoveTracker,
        max_part_weights: &[NodeWeight],
    ) -> Gain {
        match self.strategy {
            RollbackStrategy::Sequential => {
                self.revert_to_best_prefix_sequential(phg, gain_cache, tracker, max_part_weights)
            }
            RollbackStrategy::Parallel => {
                self.revert_to_best_prefix_parallel(phg, gain_cache, tracker, max_part_weights)
            }
        }
    }

    /// Reverts every valid move, replays them one at a time while tracking
    /// overloaded blocks, then reverts everything after the best index.
    #[instrument(name = "rollback.sequential", skip_all, fields(moves = tracker.num_performed_moves()))]
    pub fn revert_to_best_prefix_sequential<G: GainCache>(
        &mut self,
        phg: &PartitionedHypergraph,
        gain_cache: &G,
        tracker: &mut GlobalMoveTracker,
        max_part_weights: &[NodeWeight],
    ) -> Gain {
        let moves = tracker.moves();
        moves.par_iter().filter(|mv| mv.is_valid()).for_each(|mv| {
            revert(phg, gain_cache, mv);
        });

        let hg = phg.hypergraph();
        let is_overloaded = |b: BlockId| phg.part_weight(b) > max_part_weights[b as usize];
        let mut overloaded = (0..self.k as BlockId).filter(|&b| is_overloaded(b)).count();

        let mut best = GainIndex::default();
        let mut gain_sum = 0;
        for (i, mv) in moves.iter().enumerate() {
            if !mv.is_valid() {
                continue;
            }
            let gain: Gain = hg
                .incident_edges(mv.node)
                .iter()
                .map(|&e| {
                    let mut gain = 0;
                    if phg.pin_count_in_part(e, mv.from) == 1 {
                        gain += hg.edge_weight(e);
                    }
                    if phg.pin_count_in_part(e, mv.to) == 0 {
                        gain -= hg.edge_weight(e);
                    }
                    gain
                })
                .sum();
            gain_sum += gain;

            let from_overloaded = is_overloaded(mv.from);
            let to_overloaded = is_overloaded(mv.to);
            phg.change_node_part_with_gain_cache_update(
                mv.node,
                mv.from,
                mv.to,
                NodeWeight::MAX,
                gain_cache,
                |_| {},
            );
            if from_overloaded && !is_overloaded(mv.from) {
                overloaded -= 1;
            }
            if !to_overloaded && is_overloaded(mv.to) {
                overloaded += 1;
            }

            if overloaded == 0 && gain_sum > best.gain {
                best = GainIndex {
                    gain: gain_sum,
                    best_index: i + 1,
                };
            }
        }

        moves[best.best_index..]
            .par_iter()
            .filter(|mv| mv.is_valid())
            .for_each(|mv| revert(phg, gain_cache, mv));
        moves
            .par_iter()
            .for_each(|mv| gain_cache.recompute_penalty_entry(phg, mv.node));
        self.set_remaining_original_pins(phg);

        self.finish_phase(tracker, &moves, best)
    }

    /// Recomputes true gains in parallel, finds the best prefix with a
    /// parallel scan and reverts the remaining moves.
    #[instrument(name = "rollback.parallel", skip_all, fields(moves = tracker.num_performed_moves()))]
    pub fn revert_to_best_prefix_parallel<G: GainCache>(
        &mut self,
        phg: &PartitionedHypergraph,
        gain_cache: &G,
        tracker: &mut GlobalMoveTracker,
        max_part_weights: &[NodeWeight],
    ) -> Gain {
        let mut moves = tracker.moves();
        if moves.is_empty() {
            return 0;
        }

        let gains = self.recalculate_gains(phg, tracker, &moves);
        for (mv, gain) in moves.iter_mut().zip(gains) {
            if mv.is_valid() {
                mv.gain = gain;
            }
        }

        let hg = phg.hypergraph();
        let node_weights: Vec<NodeWeight> = moves.iter().map(|mv| hg.node_weight(mv.node)).collect();
        let initial = initial_part_weights(phg, &moves);
        let best = BalanceAndBestIndexScan::new(&moves, &node_weights, initial, max_part_weights).run();

        let (kept, rejected) = moves.split_at(best.best_index);
        rayon::join(
            || {
                rejected.par_iter().filter(|mv| mv.is_valid()).for_each(|mv| {
                    revert(phg, gain_cache, mv);
                    self.restore_original_pins(hg, mv, mv.from);
                });
            },
            || {
                kept.par_iter().filter(|mv| mv.is_valid()).for_each(|mv| {
                    self.restore_original_pins(hg, mv, mv.to);
                });
            },
        );

        moves
            .par_iter()
            .for_each(|mv| gain_cache.recompute_penalty_entry(phg, mv.node));

        debug_assert!(self.remaining_pins_match(phg));
        self.finish_phase(tracker, &moves, best)
    }

    /// Attributes each move's true objective change from move-ID flags.
    ///
    /// A move gains `w(e)` if it is the last to leave `from` on `e`, no
    /// original pin of `e` remains in `from` and no earlier move re-entered
    /// `from`. It loses `w(e)` if it is the first to enter `to`, no original
    /// pin remains in `to` and nobody left `to` after it. Two-pin edges look
    /// up the neighbour's block at the time of the move instead.
    fn recalculate_gains(
        &self,
        phg: &PartitionedHypergraph,
        tracker: &GlobalMoveTracker,
        moves: &[Move],
    ) -> Vec<Gain> {
        let hg = phg.hypergraph();
        let first_move_id = tracker.first_move_id();
        let global_id = |local: usize| first_move_id + local as MoveId;

        moves.par_iter().enumerate().for_each(|(local, mv)| {
            if !mv.is_valid() {
                return;
            }
            let id = global_id(local);
            for &e in hg.incident_edges(mv.node) {
                if hg.edge_size(e) <= 2 {
                    continue;
                }
                let first_in = &self.first_move_in[self.index(e, mv.to)];
                let mut expected = first_in.load(Ordering::Acquire);
                while tracker.is_move_stale(expected) || expected > id {
                    match first_in.compare_exchange_weak(expected, id, Ordering::AcqRel, Ordering::Acquire) {
                        Ok(_) => break,
                        Err(actual) => expected = actual,
                    }
                }
                self.last_move_out[self.index(e, mv.from)].fetch_max(id, Ordering::AcqRel);
                self.remaining_original_pins[self.index(e, mv.from)].fetch_sub(1, Ordering::Relaxed);
            }
        });

        moves
            .par_iter()
            .enumerate()
            .map(|(local, mv)| {
                if !mv.is_valid() {
                    return mv.gain;
                }
                let id = global_id(local);
                let mut gain = 0;
                for &e in hg.incident_edges(mv.node) {
                    let weight = hg.edge_weight(e);
                    if hg.edge_size(e) > 2 {
                        let first_in_from = self.first_move_in(e, mv.from);
                        if self.remaining_pins(e, mv.from) == 0
                            && self.last_move_out(e, mv.from) == id
                            && (first_in_from > id || first_in_from < first_move_id)
                        {
                            gain += weight;
                        }
                        if self.remaining_pins(e, mv.to) == 0
                            && self.first_move_in(e, mv.to) == id
                            && self.last_move_out(e, mv.to) < id
                        {
                            gain -= weight;
                        }
                    } else {
                        let v = hg.edge_target(e, mv.node);
                        let move_of_v = tracker.move_of_node(v);
                        let block_of_v = if tracker.is_move_still_valid(move_of_v) {
                            let local_v = (move_of_v - first_move_id) as usize;
                            let other = &moves[local_v];
                            if local_v < local { other.to } else { other.from }
                        } else {
                            phg.part_id(v)
                        };
                        if block_of_v == mv.to {
                            gain += weight;
                        } else if block_of_v == mv.from {
                            gain -= weight;
                        }
                    }
                }
                gain
            })
            .collect()
    }

    fn restore_original_pins(&self, hg: &Hypergraph, mv: &Move, block: BlockId) {
        for &e in hg.incident_edges(mv.node) {
            if hg.edge_size(e) > 2 {
                self.remaining_original_pins[self.index(e, block)].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn remaining_pins_match(&self, phg: &PartitionedHypergraph) -> bool {
        let hg = phg.hypergraph();
        self.remaining_original_pins.is_empty()
            || hg.edges().filter(|&e| hg.edge_size(e) > 2).all(|e| {
                (0..self.k as BlockId)
                    .all(|b| self.remaining_pins(e, b) == phg.pin_count_in_part(e, b))
            })
    }

    fn finish_phase(&mut self, tracker: &mut GlobalMoveTracker, moves: &[Move], best: GainIndex) -> Gain {
        let reverted = moves[best.best_index..].iter().filter(|mv| mv.is_valid()).count();
        record_reverted_moves(reverted);
        debug!(
            kept = best.best_index,
            reverted,
            gain = best.gain,
            "rolled back to best prefix"
        );
        if tracker.reset() {
            self.reset_stored_move_ids();
        }
        best.gain
    }

    fn reset_stored_move_ids(&mut self) {
        rayon::join(
            || {
                self.first_move_in
                    .par_iter()
                    .for_each(|id| id.store(0, Ordering::Relaxed));
            },
            || {
                self.last_move_out
                    .par_iter()
                    .for_each(|id| id.store(0, Ordering::Relaxed));
            },
        );
    }

    #[inline]
    fn index(&self, e: EdgeId, b: BlockId) -> usize {
        e as usize * self.k + b as usize
    }

    fn first_move_in(&self, e: EdgeId, b: BlockId) -> MoveId {
        self.first_move_in[self.index(e, b)].load(Ordering::Relaxed)
    }

    fn last_move_out(&self, e: EdgeId, b: BlockId) -> MoveId {
        self.last_move_out[self.index(e, b)].load(Ordering::Relaxed)
    }

    fn remaining_pins(&self, e: EdgeId, b: BlockId) -> u32 {
        self.remaining_original_pins[self.index(e, b)].load(Ordering::Relaxed)
    }
}

/// Block weights before any of the valid `moves` was applied.
fn initial_part_weights(phg: &PartitionedHypergraph, moves: &[Move]) -> Vec<NodeWeight> {
    let hg = phg.hypergraph();
    let mut weights = phg.part_weights();
    for mv in moves.iter().filter(|mv| mv.is_valid()) {
        let weight = hg.node_weight(mv.node);
        weights[mv.to as usize] -= weight;
        weights[mv.from as usize] += weight;
    }
    weights
}

fn revert<G: GainCache>(phg: &PartitionedHypergraph, gain_cache: &G, mv: &Move) {
    phg.change_node_part_with_gain_cache_update(
        mv.node,
        mv.to,
        mv.from,
        NodeWeight::MAX,
        gain_cache,
        |_| {},
    );
}

#[cfg(feature = "metrics")]
fn record_reverted_moves(count: usize) {
    metrics::counter!("tessera_rollback_reverted_moves").increment(count as u64);
}

#[cfg(not(feature = "metrics"))]
fn record_reverted_moves(_count: usize) {}
