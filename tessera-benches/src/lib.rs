//! Benchmark support crate for tessera.
//!
//! Provides synthetic planted partitions and parameter types used by the
//! Criterion benchmarks for the concurrent union-find, FM rollback and flow
//! refinement.

pub mod error;
pub mod params;
pub mod source;
