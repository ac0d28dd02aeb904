//! Synthetic planted partitions.
//!
//! Every block receives its own densely connected group of nodes; a few
//! crossing edges join random blocks. The starting partition is the planted
//! one with a share of nodes moved to random blocks, which gives FM and flow
//! refinement something to repair.

use std::sync::Arc;

use rand::{
    Rng, SeedableRng,
    rngs::SmallRng,
    seq::{SliceRandom, index::sample},
};
use tessera_core::{BlockId, EdgeWeight, Hypergraph, NodeId, PartitionedHypergraph};

use crate::error::BenchSetupError;

/// Shape of a synthetic planted partition.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Number of blocks.
    pub k: usize,
    /// Nodes planted in each block.
    pub nodes_per_block: usize,
    /// Edges generated inside each block.
    pub edges_per_block: usize,
    /// Edges joining two random blocks.
    pub crossing_edges: usize,
    /// Largest number of pins per edge; `2` generates a plain graph.
    pub max_edge_size: usize,
    /// Percentage of nodes moved to a random block.
    pub scramble_percent: u32,
    /// Seed of the generator.
    pub seed: u64,
}

impl SyntheticConfig {
    /// Planted hypergraph with `nodes_per_block` nodes in each of `k`
    /// blocks, roughly two edges per node and a fifth of the nodes misplaced.
    #[must_use]
    pub const fn planted(k: usize, nodes_per_block: usize, seed: u64) -> Self {
        Self {
            k,
            nodes_per_block,
            edges_per_block: nodes_per_block.saturating_mul(2),
            crossing_edges: k.saturating_mul(4),
            max_edge_size: 4,
            scramble_percent: 20,
            seed,
        }
    }
}

/// Builds the partitioned hypergraph described by `config`.
///
/// # Errors
/// Returns [`BenchSetupError::ZeroValue`] when a block would be empty,
/// [`BenchSetupError::IdOverflow`] when ids exceed 32 bits, and
/// [`BenchSetupError::Hypergraph`] when the generated input is rejected.
pub fn generate(config: &SyntheticConfig) -> Result<PartitionedHypergraph, BenchSetupError> {
    if config.nodes_per_block == 0 {
        return Err(BenchSetupError::ZeroValue {
            context: "nodes_per_block",
        });
    }
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let block_start = |block: usize| config.nodes_per_block.saturating_mul(block);

    let mut edges: Vec<(Vec<NodeId>, EdgeWeight)> = Vec::new();
    for block in 0..config.k {
        for _ in 0..config.edges_per_block {
            let size = rng.gen_range(2..=config.max_edge_size.max(2)).min(config.nodes_per_block);
            let pins = sample(&mut rng, config.nodes_per_block, size)
                .into_iter()
                .map(|i| node_id(block_start(block) + i))
                .collect::<Result<_, _>>()?;
            edges.push((pins, rng.gen_range(1..=3)));
        }
    }
    if config.k >= 2 {
        for _ in 0..config.crossing_edges {
            let a = rng.gen_range(0..config.k);
            let mut b = a + rng.gen_range(1..config.k);
            if b >= config.k {
                b -= config.k;
            }
            let pins = vec![
                node_id(block_start(a) + rng.gen_range(0..config.nodes_per_block))?,
                node_id(block_start(b) + rng.gen_range(0..config.nodes_per_block))?,
            ];
            edges.push((pins, 1));
        }
    }

    let node_count = block_start(config.k);
    let hg = Arc::new(Hypergraph::new(vec![1; node_count], edges)?);
    let max_block = block_id(config.k)?;
    let mut blocks = Vec::with_capacity(node_count);
    for block in 0..config.k {
        let planted = block_id(block)?;
        for _ in 0..config.nodes_per_block {
            let scrambled = max_block > 0 && rng.gen_ratio(config.scramble_percent.min(100), 100);
            blocks.push(if scrambled { rng.gen_range(0..max_block) } else { planted });
        }
    }
    PartitionedHypergraph::new(hg, config.k, blocks).map_err(BenchSetupError::from)
}

/// Link pairs funnelling `node_count` elements into `hubs` roots, in random
/// order. Every element is linked to its hub once.
///
/// # Errors
/// Returns [`BenchSetupError::ZeroValue`] for zero hubs and
/// [`BenchSetupError::IdOverflow`] when ids exceed 32 bits.
pub fn star_links(node_count: usize, hubs: usize, seed: u64) -> Result<Vec<(NodeId, NodeId)>, BenchSetupError> {
    if hubs == 0 {
        return Err(BenchSetupError::ZeroValue { context: "hubs" });
    }
    let mut rng = SmallRng::seed_from_u64(seed);
    let hub_ids = sample(&mut rng, node_count.max(hubs), hubs)
        .into_iter()
        .map(node_id)
        .collect::<Result<Vec<_>, _>>()?;
    let mut pairs = Vec::with_capacity(node_count);
    for (u, hub) in (0..node_count).zip(hub_ids.iter().cycle()) {
        pairs.push((*hub, node_id(u)?));
    }
    pairs.shuffle(&mut rng);
    Ok(pairs)
}

fn node_id(index: usize) -> Result<NodeId, BenchSetupError> {
    NodeId::try_from(index).map_err(|_| BenchSetupError::IdOverflow { index })
}

fn block_id(index: usize) -> Result<BlockId, BenchSetupError> {
    BlockId::try_from(index).map_err(|_| BenchSetupError::IdOverflow { index })
}
