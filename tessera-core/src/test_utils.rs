//! Shared fixtures for `tessera-core` unit and property tests.

use std::sync::Arc;

use proptest::test_runner::Config as ProptestConfig;
use rand::{Rng, rngs::SmallRng, seq::index::sample};
use tessera_test_support::ci::property_test_profile::ProptestRunProfile;

use crate::{
    hypergraph::{Hypergraph, PartitionedHypergraph},
    types::{BlockId, EdgeWeight, Move, NodeId, NodeWeight},
};

/// Builds a proptest configuration from the shared CI profile.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Seven unit-weight nodes and four edges, two of them with more than two
/// pins.
pub(crate) fn small_hypergraph() -> Arc<Hypergraph> {
    Arc::new(
        Hypergraph::with_unit_weights(
            7,
            [vec![0, 2], vec![0, 1, 3, 4], vec![3, 4, 6], vec![2, 5, 6]],
        )
        .expect("fixture hypergraph is valid"),
    )
}

/// Wraps `hg` with the block assignment `blocks`.
pub(crate) fn partition(hg: &Arc<Hypergraph>, k: usize, blocks: &[BlockId]) -> PartitionedHypergraph {
    PartitionedHypergraph::new(Arc::clone(hg), k, blocks.to_vec()).expect("fixture partition is valid")
}

/// Six unit nodes on a graph, bisected as `[0, 0, 0, 0, 1, 1]`.
///
/// Moving node 0 into block 1 uncuts both of its edges (gain 3); moving
/// nodes 1 and 2 afterwards cuts one edge each and overloads block 1 under
/// a limit of 4.
pub(crate) struct RollbackExample {
    pub(crate) phg: PartitionedHypergraph,
    pub(crate) moves: [Move; 3],
    pub(crate) max_part_weights: [NodeWeight; 2],
}

impl RollbackExample {
    pub(crate) fn new() -> Self {
        let hg = Arc::new(
            Hypergraph::new(
                vec![1; 6],
                vec![(vec![0, 4], 2), (vec![0, 5], 1), (vec![1, 3], 1), (vec![2, 3], 1)],
            )
            .expect("fixture graph is valid"),
        );
        Self {
            phg: partition(&hg, 2, &[0, 0, 0, 0, 1, 1]),
            moves: [Move::new(0, 0, 1, 3), Move::new(1, 0, 1, -1), Move::new(2, 0, 1, -1)],
            max_part_weights: [4, 4],
        }
    }
}

/// Random hypergraph with `nodes` nodes of weight `1..=3` and `edges` edges
/// of weight `1..=4`; edge sizes are drawn from `2..=max_edge_size`.
pub(crate) fn random_hypergraph(
    rng: &mut SmallRng,
    nodes: usize,
    edges: usize,
    max_edge_size: usize,
) -> Arc<Hypergraph> {
    let weights: Vec<NodeWeight> = (0..nodes).map(|_| rng.gen_range(1..=3)).collect();
    let edge_list: Vec<(Vec<NodeId>, EdgeWeight)> = (0..edges)
        .map(|_| {
            let size = rng.gen_range(2..=max_edge_size.clamp(2, nodes));
            let pins = sample(rng, nodes, size)
                .into_iter()
                .map(|pin| pin as NodeId)
                .collect();
            (pins, rng.gen_range(1..=4))
        })
        .collect();
    Arc::new(Hypergraph::new(weights, edge_list).expect("generated hypergraph is valid"))
}

/// Uniformly random assignment of `nodes` nodes to `k` blocks.
pub(crate) fn random_blocks(rng: &mut SmallRng, nodes: usize, k: usize) -> Vec<BlockId> {
    (0..nodes).map(|_| rng.gen_range(0..k as BlockId)).collect()
}
