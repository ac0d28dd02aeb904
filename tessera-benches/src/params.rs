//! Benchmark parameter types.

use std::fmt;

/// Parameters for a refinement benchmark run.
#[derive(Clone, Debug)]
pub struct PartitionBenchParams {
    /// Number of nodes in the synthetic hypergraph.
    pub node_count: usize,
    /// Number of blocks.
    pub k: usize,
}

impl fmt::Display for PartitionBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},k={}", self.node_count, self.k)
    }
}

/// Parameters for a union-find contention benchmark run.
#[derive(Clone, Debug)]
pub struct LinkBenchParams {
    /// Number of elements.
    pub node_count: usize,
    /// Number of distinct roots all links are funnelled into.
    pub hubs: usize,
}

impl fmt::Display for LinkBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},hubs={}", self.node_count, self.hubs)
    }
}
