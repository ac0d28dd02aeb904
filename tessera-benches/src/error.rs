//! Benchmark setup error type.
//!
//! Aggregates the errors that may arise while preparing benchmark inputs so
//! that setup functions can propagate failures with `?` instead of using
//! `.expect()`.

use tessera_core::{HypergraphError, RefinementError};

/// Errors that may occur during benchmark setup.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// The synthetic hypergraph or its partition was rejected.
    #[error("synthetic input is invalid: {0}")]
    Hypergraph(#[from] HypergraphError),
    /// A refiner could not be configured or initialised.
    #[error("refinement setup failed: {0}")]
    Refinement(#[from] RefinementError),
    /// A zero value was passed where a non-zero integer was required.
    #[error("expected a non-zero value for {context}")]
    ZeroValue {
        /// A description of the parameter that was unexpectedly zero.
        context: &'static str,
    },
    /// An index does not fit the core's 32-bit node and block ids.
    #[error("index {index} does not fit a 32-bit id")]
    IdOverflow {
        /// The offending index.
        index: usize,
    },
}
