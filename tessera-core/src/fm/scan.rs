//! Parallel prefix scan for the best balanced prefix of a move sequence.
//!
//! The sequence is cut into chunks. A pre-scan summarises every chunk as a
//! block-weight delta plus a gain sum; summaries are joined left to right to
//! give each chunk its starting state; the final scan then replays every chunk
//! from that state and reports its best prefix. Partial results combine with
//! [`GainIndex::better`], which keeps the earliest index among equal gains.

use rayon::prelude::*;

use crate::types::{Gain, Move, NodeWeight};

/// Moves handled by one scan task.
const CHUNK_SIZE: usize = 2500;

/// Best prefix found by a scan.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GainIndex {
    /// Gain of all valid moves before `best_index`.
    pub gain: Gain,
    /// Number of leading moves to keep; the first move to revert.
    pub best_index: usize,
}

impl GainIndex {
    /// Picks the larger gain, breaking ties toward the earlier index.
    #[must_use]
    pub fn better(self, other: Self) -> Self {
        if other.gain > self.gain || (other.gain == self.gain && other.best_index < self.best_index) {
            other
        } else {
            self
        }
    }
}

/// Scan state: block weights and gain sum before the scanned range.
#[derive(Clone, Debug)]
pub(crate) struct BalanceAndBestIndexScan<'a> {
    moves: &'a [Move],
    node_weights: &'a [NodeWeight],
    max_part_weights: &'a [NodeWeight],
    part_weights: Vec<NodeWeight>,
    gain_sum: Gain,
}

impl<'a> BalanceAndBestIndexScan<'a> {
    /// `node_weights[i]` is the weight of `moves[i].node`.
    pub(crate) fn new(
        moves: &'a [Move],
        node_weights: &'a [NodeWeight],
        initial_part_weights: Vec<NodeWeight>,
        max_part_weights: &'a [NodeWeight],
    ) -> Self {
        debug_assert_eq!(moves.len(), node_weights.len());
        Self {
            moves,
            node_weights,
            max_part_weights,
            part_weights: initial_part_weights,
            gain_sum: 0,
        }
    }

    /// Finds the best balanced prefix of the whole sequence.
    pub(crate) fn run(self) -> GainIndex {
        let len = self.moves.len();
        let ranges: Vec<(usize, usize)> = (0..len)
            .step_by(CHUNK_SIZE)
            .map(|start| (start, (start + CHUNK_SIZE).min(len)))
            .collect();

        let summaries: Vec<Self> = ranges
            .par_iter()
            .map(|&(start, end)| {
                let mut summary = self.split();
                summary.pre_scan(start, end);
                summary
            })
            .collect();

        let mut prefix_states = Vec::with_capacity(ranges.len());
        let mut state = self;
        for summary in &summaries {
            prefix_states.push(state.clone());
            state.reverse_join(summary);
        }

        prefix_states
            .into_par_iter()
            .zip(ranges)
            .map(|(mut state, (start, end))| state.final_scan(start, end))
            .reduce(GainIndex::default, GainIndex::better)
    }

    /// An empty state over the same sequence.
    fn split(&self) -> Self {
        Self {
            moves: self.moves,
            node_weights: self.node_weights,
            max_part_weights: self.max_part_weights,
            part_weights: vec![0; self.part_weights.len()],
            gain_sum: 0,
        }
    }

    fn pre_scan(&mut self, start: usize, end: usize) {
        for (mv, &weight) in self.moves[start..end].iter().zip(&self.node_weights[start..end]) {
            if mv.is_valid() {
                self.gain_sum += mv.gain;
                self.part_weights[mv.from as usize] -= weight;
                self.part_weights[mv.to as usize] += weight;
            }
        }
    }

    /// Appends the summary of the range following this state.
    fn reverse_join(&mut self, rhs: &Self) {
        for (weight, delta) in self.part_weights.iter_mut().zip(&rhs.part_weights) {
            *weight += delta;
        }
        self.gain_sum += rhs.gain_sum;
    }

    fn final_scan(&mut self, start: usize, end: usize) -> GainIndex {
        let mut overloaded = self
            .part_weights
            .iter()
            .zip(self.max_part_weights)
            .filter(|&(weight, max)| weight > max)
            .count();

        let mut best = GainIndex::default();
        for (i, (mv, &weight)) in self.moves[start..end]
            .iter()
            .zip(&self.node_weights[start..end])
            .enumerate()
        {
            if !mv.is_valid() {
                continue;
            }
            let (from, to) = (mv.from as usize, mv.to as usize);
            let from_overloaded = self.part_weights[from] > self.max_part_weights[from];
            self.part_weights[from] -= weight;
            if from_overloaded && self.part_weights[from] <= self.max_part_weights[from] {
                overloaded -= 1;
            }
            let to_overloaded = self.part_weights[to] > self.max_part_weights[to];
            self.part_weights[to] += weight;
            if !to_overloaded && self.part_weights[to] > self.max_part_weights[to] {
                overloaded += 1;
            }

            self.gain_sum += mv.gain;
            if overloaded == 0 && self.gain_sum > best.gain {
                best = GainIndex {
                    gain: self.gain_sum,
                    best_index: start + i + 1,
                };
            }
        }
        best
    }
}
