//! Per-search gain overlay for speculative moves.

use std::collections::HashMap;

use super::GainCache;
use crate::{
    hypergraph::{EdgeUpdate, PartitionView},
    types::{BlockId, Gain, NodeId},
};

/// Thread-local sparse overlay over a shared [`GainCache`].
///
/// Reads return the shared entry plus the local delta. Updates only touch the
/// overlay, so speculative moves stay invisible to other workers; dropping the
/// speculation is a [`DeltaGainCache::clear`].
#[derive(Debug)]
pub struct DeltaGainCache<'a, G> {
    shared: &'a G,
    deltas: HashMap<usize, Gain>,
}

impl<'a, G: GainCache> DeltaGainCache<'a, G> {
    /// Creates an empty overlay over `shared`.
    #[must_use]
    pub fn new(shared: &'a G) -> Self {
        Self {
            shared,
            deltas: HashMap::new(),
        }
    }

    /// Returns the shared cache below the overlay.
    #[must_use]
    #[rustfmt::skip]
    pub fn shared(&self) -> &'a G { self.shared }

    /// Benefit of moving `u` into `to`, including local deltas.
    #[must_use]
    pub fn benefit_term(&self, u: NodeId, to: BlockId) -> Gain {
        let index = self.shared.benefit_index(u, to);
        self.shared.benefit_term(u, to) + self.local(index)
    }

    /// Penalty of moving `u` out of `from`, including local deltas.
    #[must_use]
    pub fn penalty_term(&self, u: NodeId, from: BlockId) -> Gain {
        let index = self.shared.penalty_index(u, from);
        self.shared.penalty_term(u, from) + self.local(index)
    }

    /// Gain of moving `u` from `from` to `to`, including local deltas.
    #[must_use]
    pub fn gain(&self, u: NodeId, from: BlockId, to: BlockId) -> Gain {
        self.benefit_term(u, to) - self.penalty_term(u, from)
    }

    /// Records the effect of one speculative edge update in the overlay.
    pub fn delta_gain_update<V: PartitionView + ?Sized>(&mut self, view: &V, update: &EdgeUpdate) {
        let deltas = &mut self.deltas;
        self.shared.entry_updates(view, update, |index, delta| {
            *deltas.entry(index).or_insert(0) += delta;
        });
    }

    /// Overrides the penalty of `u` with a value recomputed from `view`.
    pub fn recompute_penalty_entry<V: PartitionView + ?Sized>(&mut self, view: &V, u: NodeId) {
        let from = view.part_id(u);
        let index = self.shared.penalty_index(u, from);
        let recomputed = self.shared.recompute_penalty_term(view, u, from);
        let delta = recomputed - self.shared.entry(index);
        self.deltas.insert(index, delta);
    }

    /// Discards every local delta.
    pub fn clear(&mut self) {
        self.deltas.clear();
    }

    /// Returns the number of entries touched by speculation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Returns `true` when no speculative update is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    fn local(&self, index: usize) -> Gain {
        self.deltas.get(&index).copied().unwrap_or(0)
    }
}
