//! Common entry point of every refinement algorithm.

use crate::{error::Result, gain::GainCache, hypergraph::PartitionedHypergraph, types::Gain};

/// Quality of the current partition, updated in place by refiners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Metrics {
    /// Value of the objective the gain cache optimises.
    pub objective: Gain,
    /// Largest relative block overload.
    pub imbalance: f64,
}

/// A refinement algorithm operating on a shared partition.
pub trait Refiner<G: GainCache> {
    /// Improves `phg` and updates `metrics` to the resulting quality.
    ///
    /// Returns `true` when the objective improved.
    ///
    /// # Errors
    /// Returns [`crate::RefinementError`] when the gain cache cannot serve the
    /// partition.
    fn refine(
        &mut self,
        phg: &PartitionedHypergraph,
        gain_cache: &mut G,
        metrics: &mut Metrics,
    ) -> Result<bool>;
}

/// Initialises `gain_cache` for `phg` unless it already is.
pub(crate) fn ensure_initialized<G: GainCache>(
    phg: &PartitionedHypergraph,
    gain_cache: &mut G,
) -> Result<()> {
    if gain_cache.is_initialized() {
        Ok(())
    } else {
        gain_cache.initialize(phg)
    }
}
