//! Tessera core library: concurrent refinement of hypergraph partitions.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod advanced;
mod coarsening;
mod config;
mod error;
mod fm;
mod gain;
mod hypergraph;
pub mod objective;
mod ownership;
mod rebalancer;
mod refiner;
mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::{
    advanced::{
        BlockPair, Capacity, EdmondsKarpSolver, FlowNetwork, FlowProblem, FlowRefinementScheduler,
        FlowRefiner, FlowSolver, INFINITE_CAPACITY, MoveSequence, MoveSequenceState,
        ProblemConstruction, ProblemStats, QuotientGraph, RegionLimit, Subproblem,
    },
    coarsening::{Clustering, LinkOutcome, WeightedConcurrentUnionFind, cluster_pairs},
    config::{FlowConfig, FmConfig, PartitionContext, RefinementConfig, RefinementConfigBuilder, RollbackStrategy},
    error::{HypergraphError, HypergraphErrorCode, RefinementError, RefinementErrorCode, Result},
    fm::{FmRefiner, GainIndex, GlobalMoveTracker, GlobalRollback},
    gain::{DeltaGainCache, GainCache, GraphCutGainCache, Km1GainCache, objective_delta},
    hypergraph::{EdgeUpdate, Hypergraph, PartitionView, PartitionedHypergraph},
    ownership::NodeOwnership,
    rebalancer::Rebalancer,
    refiner::{Metrics, Refiner},
    types::{
        BlockId, EdgeId, EdgeWeight, Gain, INVALID_BLOCK, INVALID_GAIN, Move, MoveId, NodeId,
        NodeWeight, SearchId,
    },
};
