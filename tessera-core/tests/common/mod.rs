//! Planted-partition fixtures shared by the integration tests.

use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::SmallRng, seq::index::sample};
use tessera_core::{BlockId, EdgeWeight, Hypergraph, NodeId, PartitionedHypergraph};

/// Shape of a planted partition.
#[derive(Clone, Copy, Debug)]
pub struct Planted {
    pub k: usize,
    pub nodes_per_block: usize,
    pub internal_edges_per_block: usize,
    pub crossing_edges: usize,
    pub max_edge_size: usize,
    /// Share of nodes moved to a random block before refinement starts.
    pub scramble: f64,
}

impl Planted {
    #[must_use]
    pub const fn hypergraph(k: usize) -> Self {
        Self {
            k,
            nodes_per_block: 32,
            internal_edges_per_block: 72,
            crossing_edges: 6,
            max_edge_size: 4,
            scramble: 0.2,
        }
    }

    #[must_use]
    pub const fn graph(k: usize) -> Self {
        Self {
            max_edge_size: 2,
            internal_edges_per_block: 96,
            ..Self::hypergraph(k)
        }
    }

    /// Builds the hypergraph and a scrambled copy of the planted assignment.
    #[must_use]
    pub fn build(self, seed: u64) -> PartitionedHypergraph {
        let mut rng = SmallRng::seed_from_u64(seed);
        let nodes = self.k * self.nodes_per_block;
        let node_in = |rng: &mut SmallRng, block: usize, count: usize| -> Vec<NodeId> {
            sample(rng, self.nodes_per_block, count)
                .into_iter()
                .map(|i| (block * self.nodes_per_block + i) as NodeId)
                .collect()
        };

        let mut edges: Vec<(Vec<NodeId>, EdgeWeight)> = Vec::new();
        for block in 0..self.k {
            for _ in 0..self.internal_edges_per_block {
                let size = rng.gen_range(2..=self.max_edge_size);
                edges.push((node_in(&mut rng, block, size), rng.gen_range(1..=3)));
            }
        }
        for _ in 0..self.crossing_edges {
            let a = rng.gen_range(0..self.k);
            let b = (a + rng.gen_range(1..self.k)) % self.k;
            let mut pins = node_in(&mut rng, a, 1);
            pins.extend(node_in(&mut rng, b, 1));
            edges.push((pins, 1));
        }
        let hg = Arc::new(Hypergraph::new(vec![1; nodes], edges).expect("planted hypergraph is valid"));

        let blocks: Vec<BlockId> = (0..nodes)
            .map(|u| {
                if rng.gen_bool(self.scramble) {
                    rng.gen_range(0..self.k as BlockId)
                } else {
                    (u / self.nodes_per_block) as BlockId
                }
            })
            .collect();
        PartitionedHypergraph::new(hg, self.k, blocks).expect("planted partition is valid")
    }
}
