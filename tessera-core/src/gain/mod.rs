//! Incrementally maintained move gains.
//!
//! A gain cache stores, per node, the edge weight that would stop or start
//! counting toward the objective if the node moved. The shared tables live in
//! [`GraphCutGainCache`] and [`Km1GainCache`]; speculative local searches read
//! through a [`DeltaGainCache`] overlay instead of mutating shared state.
//!
//! Each cache expresses its update rule once, as a stream of
//! `(entry index, delta)` pairs produced by [`GainCache::entry_updates`]. The
//! shared table applies them with relaxed atomic adds and the overlay folds
//! them into a sparse map, so both tiers follow the same rule.

mod delta;
mod graph_cut;
mod km1;

use std::sync::atomic::{AtomicI64, Ordering};

use rayon::prelude::*;

use crate::{
    error::Result,
    hypergraph::{EdgeUpdate, PartitionView, PartitionedHypergraph},
    types::{BlockId, Gain, NodeId},
};

pub use self::{delta::DeltaGainCache, graph_cut::GraphCutGainCache, km1::Km1GainCache};

/// Shared per-node gain table behind a single read API.
pub trait GainCache: Send + Sync {
    /// Returns the number of blocks the cache was sized for.
    fn k(&self) -> usize;

    /// Computes every entry from scratch, in parallel.
    ///
    /// # Errors
    /// Returns [`crate::RefinementError::GainCacheMismatch`] when the cache was
    /// sized for a different partition and
    /// [`crate::RefinementError::UnsupportedObjective`] when the cache cannot
    /// represent its objective on the input.
    fn initialize(&mut self, phg: &PartitionedHypergraph) -> Result<()>;

    /// Zeroes the table and marks it uninitialised.
    fn reset(&mut self);

    /// Returns `true` once [`GainCache::initialize`] has run.
    fn is_initialized(&self) -> bool;

    /// Flat index of the benefit entry of `u` toward `to`.
    fn benefit_index(&self, u: NodeId, to: BlockId) -> usize;

    /// Flat index of the penalty entry of `u` when leaving `from`.
    fn penalty_index(&self, u: NodeId, from: BlockId) -> usize;

    /// Reads the raw entry at `index`.
    fn entry(&self, index: usize) -> Gain;

    /// Adds `delta` to the raw entry at `index`.
    fn add_to_entry(&self, index: usize, delta: Gain);

    /// Emits the entry changes one edge update causes for the pins of that
    /// edge, evaluated against the block assignment `view`.
    fn entry_updates<V: PartitionView + ?Sized>(
        &self,
        view: &V,
        update: &EdgeUpdate,
        sink: impl FnMut(usize, Gain),
    );

    /// Refreshes the penalty entry of `u` from the current pin counts.
    fn recompute_penalty_entry<V: PartitionView + ?Sized>(&self, view: &V, u: NodeId);

    /// Recomputes the benefit of `u` toward `to` by direct enumeration.
    fn recompute_benefit_term<V: PartitionView + ?Sized>(
        &self,
        view: &V,
        u: NodeId,
        to: BlockId,
    ) -> Gain;

    /// Recomputes the penalty of `u` leaving `from` by direct enumeration.
    fn recompute_penalty_term<V: PartitionView + ?Sized>(
        &self,
        view: &V,
        u: NodeId,
        from: BlockId,
    ) -> Gain;

    /// Returns the objective this cache computes gains for.
    fn objective(phg: &PartitionedHypergraph) -> Gain
    where
        Self: Sized;

    /// Benefit of moving `u` into `to`.
    #[inline]
    fn benefit_term(&self, u: NodeId, to: BlockId) -> Gain {
        debug_assert!(self.is_initialized(), "gain cache read before initialisation");
        self.entry(self.benefit_index(u, to))
    }

    /// Penalty of moving `u` out of `from`.
    #[inline]
    fn penalty_term(&self, u: NodeId, from: BlockId) -> Gain {
        debug_assert!(self.is_initialized(), "gain cache read before initialisation");
        self.entry(self.penalty_index(u, from))
    }

    /// Gain of moving `u` from `from` to `to`.
    #[inline]
    fn gain(&self, u: NodeId, from: BlockId, to: BlockId) -> Gain {
        self.benefit_term(u, to) - self.penalty_term(u, from)
    }

    /// Applies the effect of one edge update to the shared table.
    #[inline]
    fn delta_gain_update<V: PartitionView + ?Sized>(&self, view: &V, update: &EdgeUpdate) {
        self.entry_updates(view, update, |index, delta| self.add_to_entry(index, delta));
    }
}

/// Change of the objective caused by one edge update; negative values are
/// improvements.
///
/// The edge starts counting toward `to` when its first pin arrives there and
/// stops counting toward `from` when its last pin leaves. For two-pin edges
/// this equals the change of the cut.
///
/// # Examples
/// ```
/// use tessera_core::{EdgeUpdate, objective_delta};
///
/// let update = EdgeUpdate {
///     node: 0,
///     edge: 0,
///     edge_weight: 3,
///     edge_size: 2,
///     from: 0,
///     to: 1,
///     pin_count_in_from_after: 0,
///     pin_count_in_to_after: 2,
/// };
/// assert_eq!(objective_delta(&update), -3);
/// ```
#[must_use]
pub const fn objective_delta(update: &EdgeUpdate) -> Gain {
    let entered = if update.pin_count_in_to_after == 1 { update.edge_weight } else { 0 };
    let left = if update.pin_count_in_from_after == 0 { update.edge_weight } else { 0 };
    entered - left
}

/// Flat table of relaxed atomic counters.
#[derive(Debug)]
pub(crate) struct GainTable {
    entries: Vec<AtomicI64>,
}

impl GainTable {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            entries: (0..len).map(|_| AtomicI64::new(0)).collect(),
        }
    }

    #[rustfmt::skip]
    pub(crate) fn len(&self) -> usize { self.entries.len() }

    #[inline]
    pub(crate) fn load(&self, index: usize) -> Gain {
        self.entries[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn store(&self, index: usize, value: Gain) {
        self.entries[index].store(value, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(&self, index: usize, delta: Gain) {
        self.entries[index].fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn zero(&self) {
        self.entries
            .par_iter()
            .for_each(|entry| entry.store(0, Ordering::Relaxed));
    }
}

impl Clone for GainTable {
    fn clone(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|entry| AtomicI64::new(entry.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}
