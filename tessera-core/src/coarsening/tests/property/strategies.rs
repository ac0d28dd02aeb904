//! Link-sequence generators.

use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::SmallRng, seq::SliceRandom};

use super::types::{LinkFixture, LinkPattern};
use crate::types::{NodeId, NodeWeight};

const MIN_NODES: usize = 4;
const MAX_NODES: usize = 96;

pub(super) fn link_fixture_strategy() -> impl Strategy<Value = LinkFixture> {
    (any::<LinkPattern>(), any::<u64>()).prop_map(|(pattern, seed)| {
        let mut rng = SmallRng::seed_from_u64(seed);
        generate_fixture(pattern, &mut rng)
    })
}

pub(super) fn generate_fixture(pattern: LinkPattern, rng: &mut SmallRng) -> LinkFixture {
    let n = rng.gen_range(MIN_NODES..=MAX_NODES);
    let weights: Vec<NodeWeight> = (0..n).map(|_| rng.gen_range(1..=5)).collect();
    let special: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.1)).collect();
    let node = |rng: &mut SmallRng| rng.gen_range(0..n as NodeId);

    let pairs = match pattern {
        LinkPattern::Random => (0..n).map(|_| (node(rng), node(rng))).collect(),
        LinkPattern::Chain => {
            let mut order: Vec<NodeId> = (0..n as NodeId).collect();
            order.shuffle(rng);
            let mut pairs: Vec<(NodeId, NodeId)> = order.windows(2).map(|w| (w[0], w[1])).collect();
            pairs.shuffle(rng);
            pairs
        }
        LinkPattern::Star => {
            let hubs: Vec<NodeId> = (0..rng.gen_range(1..=3)).map(|_| node(rng)).collect();
            (0..n as NodeId)
                .map(|u| (hubs[u as usize % hubs.len()], u))
                .collect()
        }
        LinkPattern::Redundant => (0..n / 2)
            .flat_map(|_| {
                let (u, v) = (node(rng), node(rng));
                [(u, v), (v, u)]
            })
            .collect(),
    };
    LinkFixture {
        weights,
        special,
        pairs,
        pattern,
    }
}
