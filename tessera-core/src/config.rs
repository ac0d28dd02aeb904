//! Refinement configuration and the balance context derived from it.
//!
//! [`RefinementConfigBuilder`] validates every knob once; the refiners only
//! ever see a [`RefinementConfig`]. [`PartitionContext`] turns the allowed
//! imbalance into per-block weight limits.

use std::time::Duration;

use crate::{
    error::{RefinementError, Result},
    hypergraph::{PartitionView, PartitionedHypergraph},
    types::{BlockId, NodeWeight},
};

/// Selects the algorithm that consolidates the global move log.
///
/// Both strategies keep the same prefix and report the same gain.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RollbackStrategy {
    /// Revert everything, then replay move by move on one thread.
    Sequential,
    /// Recompute gains and scan for the best prefix on the rayon pool.
    #[default]
    Parallel,
}

/// Settings of the localized FM phase and its rollback.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct FmConfig {
    /// Rollback algorithm.
    pub rollback_strategy: RollbackStrategy,
    /// Scales the allowed imbalance during rollback; `0` disables balance checks.
    pub rollback_balance_violation_factor: f64,
    /// Seed nodes handed to one localized search.
    pub num_seed_nodes: usize,
    /// Moves without a new best prefix after which a search gives up.
    pub max_fruitless_moves: usize,
    /// Upper bound on FM rounds per call.
    pub max_rounds: usize,
    /// Seed for shuffling the border nodes.
    pub rng_seed: u64,
}

/// Settings of flow-based refinement on block pairs.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct FlowConfig {
    /// Cut edges requested from the quotient graph per batch.
    pub num_cut_edges_per_block_pair: usize,
    /// Maximum BFS distance from the initial cut frontier.
    pub max_bfs_distance: usize,
    /// Lets concurrent searches share nodes instead of claiming them.
    pub use_overlapping_searches: bool,
    /// Region size scaling; a block stops contributing once the region holds
    /// `(1 + alpha * epsilon) * perfect - weight(other block)` of it.
    pub alpha: f64,
    /// Wall-clock budget of one flow search.
    pub time_limit: Duration,
    /// Upper bound on scheduler rounds per call.
    pub max_rounds: usize,
}

/// Validated refinement configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RefinementConfig {
    epsilon: f64,
    fm: FmConfig,
    flows: FlowConfig,
}

impl RefinementConfig {
    /// Returns the allowed imbalance.
    #[must_use]
    #[rustfmt::skip]
    pub fn epsilon(&self) -> f64 { self.epsilon }

    /// Returns the FM settings.
    #[must_use]
    #[rustfmt::skip]
    pub fn fm(&self) -> &FmConfig { &self.fm }

    /// Returns the flow settings.
    #[must_use]
    #[rustfmt::skip]
    pub fn flows(&self) -> &FlowConfig { &self.flows }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        let builder = RefinementConfigBuilder::default();
        Self {
            epsilon: builder.epsilon,
            fm: builder.fm,
            flows: builder.flows,
        }
    }
}

/// Configures and validates a [`RefinementConfig`].
///
/// # Examples
/// ```
/// use tessera_core::{RefinementConfigBuilder, RollbackStrategy};
///
/// let config = RefinementConfigBuilder::new()
///     .with_epsilon(0.05)
///     .with_rollback_strategy(RollbackStrategy::Sequential)
///     .with_max_bfs_distance(3)
///     .build()
///     .expect("configuration is valid");
/// assert_eq!(config.epsilon(), 0.05);
/// assert_eq!(config.fm().rollback_strategy, RollbackStrategy::Sequential);
/// assert_eq!(config.flows().max_bfs_distance, 3);
/// ```
#[derive(Clone, Debug)]
pub struct RefinementConfigBuilder {
    epsilon: f64,
    fm: FmConfig,
    flows: FlowConfig,
}

impl Default for RefinementConfigBuilder {
    fn default() -> Self {
        Self {
            epsilon: 0.03,
            fm: FmConfig {
                rollback_strategy: RollbackStrategy::Parallel,
                rollback_balance_violation_factor: 1.25,
                num_seed_nodes: 25,
                max_fruitless_moves: 350,
                max_rounds: 10,
                rng_seed: 0x7E55_E7A0,
            },
            flows: FlowConfig {
                num_cut_edges_per_block_pair: 50,
                max_bfs_distance: 2,
                use_overlapping_searches: false,
                alpha: 16.0,
                time_limit: Duration::from_secs(1),
                max_rounds: 2,
            },
        }
    }
}

impl RefinementConfigBuilder {
    /// Creates a builder populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the allowed imbalance.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Selects the rollback algorithm.
    #[must_use]
    pub fn with_rollback_strategy(mut self, strategy: RollbackStrategy) -> Self {
        self.fm.rollback_strategy = strategy;
        self
    }

    /// Scales the imbalance tolerated by the rollback; `0` disables the check.
    #[must_use]
    pub fn with_rollback_balance_violation_factor(mut self, factor: f64) -> Self {
        self.fm.rollback_balance_violation_factor = factor;
        self
    }

    /// Overrides the number of seed nodes per localized search.
    #[must_use]
    pub fn with_num_seed_nodes(mut self, seeds: usize) -> Self {
        self.fm.num_seed_nodes = seeds;
        self
    }

    /// Overrides the fruitless-move budget of a localized search.
    #[must_use]
    pub fn with_max_fruitless_moves(mut self, moves: usize) -> Self {
        self.fm.max_fruitless_moves = moves;
        self
    }

    /// Overrides the number of FM rounds.
    #[must_use]
    pub fn with_fm_rounds(mut self, rounds: usize) -> Self {
        self.fm.max_rounds = rounds;
        self
    }

    /// Seeds the border-node shuffle.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.fm.rng_seed = seed;
        self
    }

    /// Overrides the number of cut edges fetched per batch.
    #[must_use]
    pub fn with_num_cut_edges_per_block_pair(mut self, edges: usize) -> Self {
        self.flows.num_cut_edges_per_block_pair = edges;
        self
    }

    /// Overrides the BFS depth of region construction.
    #[must_use]
    pub fn with_max_bfs_distance(mut self, distance: usize) -> Self {
        self.flows.max_bfs_distance = distance;
        self
    }

    /// Lets concurrent region searches share nodes.
    #[must_use]
    pub fn with_overlapping_searches(mut self, enabled: bool) -> Self {
        self.flows.use_overlapping_searches = enabled;
        self
    }

    /// Overrides the region size scaling factor.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.flows.alpha = alpha;
        self
    }

    /// Overrides the wall-clock budget of one flow search.
    #[must_use]
    pub fn with_flow_time_limit(mut self, limit: Duration) -> Self {
        self.flows.time_limit = limit;
        self
    }

    /// Overrides the number of flow scheduler rounds.
    #[must_use]
    pub fn with_flow_rounds(mut self, rounds: usize) -> Self {
        self.flows.max_rounds = rounds;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`RefinementError::InvalidParameters`] when a ratio is negative
    /// or not finite, or when a count or duration that must be positive is zero.
    pub fn build(self) -> Result<RefinementConfig> {
        non_negative("epsilon", self.epsilon)?;
        non_negative(
            "rollback_balance_violation_factor",
            self.fm.rollback_balance_violation_factor,
        )?;
        non_negative("alpha", self.flows.alpha)?;
        positive("num_seed_nodes", self.fm.num_seed_nodes)?;
        positive("max_fruitless_moves", self.fm.max_fruitless_moves)?;
        positive(
            "num_cut_edges_per_block_pair",
            self.flows.num_cut_edges_per_block_pair,
        )?;
        if self.flows.time_limit.is_zero() {
            return Err(RefinementError::InvalidParameters {
                reason: "flow time_limit must be greater than zero".into(),
            });
        }
        Ok(RefinementConfig {
            epsilon: self.epsilon,
            fm: self.fm,
            flows: self.flows,
        })
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RefinementError::InvalidParameters {
            reason: format!("{name} must be finite and non-negative (got {value})"),
        })
    }
}

fn positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        Err(RefinementError::InvalidParameters {
            reason: format!("{name} must be greater than zero"),
        })
    } else {
        Ok(())
    }
}

/// Per-block weight limits derived from the total weight and the allowed
/// imbalance.
///
/// # Examples
/// ```
/// use tessera_core::PartitionContext;
///
/// let ctx = PartitionContext::new(10, 3, 0.1);
/// assert_eq!(ctx.perfect_balance_part_weight(0), 4);
/// assert_eq!(ctx.max_part_weight(0), 4);
/// assert_eq!(ctx.scaled_max_part_weights(0.0), vec![i64::MAX; 3]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionContext {
    epsilon: f64,
    perfect_balance_part_weights: Vec<NodeWeight>,
    max_part_weights: Vec<NodeWeight>,
}

impl PartitionContext {
    /// Derives `ceil(total / k)` and `floor(perfect * (1 + epsilon))` for
    /// every block.
    #[must_use]
    pub fn new(total_weight: NodeWeight, k: usize, epsilon: f64) -> Self {
        let perfect = (total_weight + k as NodeWeight - 1) / k as NodeWeight;
        let max = (perfect as f64 * (1.0 + epsilon)).floor() as NodeWeight;
        Self {
            epsilon,
            perfect_balance_part_weights: vec![perfect; k],
            max_part_weights: vec![max; k],
        }
    }

    /// Derives the context for the partition `phg`.
    #[must_use]
    pub fn for_partition(phg: &PartitionedHypergraph, epsilon: f64) -> Self {
        Self::new(phg.hypergraph().total_weight(), phg.k(), epsilon)
    }

    /// Replaces the derived limits with explicit ones.
    #[must_use]
    pub fn with_max_part_weights(mut self, max_part_weights: Vec<NodeWeight>) -> Self {
        debug_assert_eq!(max_part_weights.len(), self.max_part_weights.len());
        self.max_part_weights = max_part_weights;
        self
    }

    /// Returns the number of blocks.
    #[must_use]
    #[rustfmt::skip]
    pub fn k(&self) -> usize { self.max_part_weights.len() }

    /// Returns the allowed imbalance.
    #[must_use]
    #[rustfmt::skip]
    pub fn epsilon(&self) -> f64 { self.epsilon }

    /// Returns `ceil(total / k)` for block `b`.
    #[must_use]
    pub fn perfect_balance_part_weight(&self, b: BlockId) -> NodeWeight {
        self.perfect_balance_part_weights[b as usize]
    }

    /// Returns the weight limit of block `b`.
    #[must_use]
    pub fn max_part_weight(&self, b: BlockId) -> NodeWeight {
        self.max_part_weights[b as usize]
    }

    /// Returns every block's weight limit.
    #[must_use]
    #[rustfmt::skip]
    pub fn max_part_weights(&self) -> &[NodeWeight] { &self.max_part_weights }

    /// Returns `perfect * (1 + epsilon * factor)` per block, or no limit at
    /// all when `factor` is zero.
    #[must_use]
    pub fn scaled_max_part_weights(&self, factor: f64) -> Vec<NodeWeight> {
        if factor == 0.0 {
            return vec![NodeWeight::MAX; self.k()];
        }
        self.perfect_balance_part_weights
            .iter()
            .map(|&perfect| (perfect as f64 * (1.0 + self.epsilon * factor)).floor() as NodeWeight)
            .collect()
    }
}
