//! Fixture types for union-find property tests.

use test_strategy::Arbitrary;

use crate::types::{NodeId, NodeWeight};

/// Shape of the generated link sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Arbitrary)]
pub(super) enum LinkPattern {
    /// Uniformly random pairs.
    #[weight(3)]
    Random,
    /// Consecutive nodes in shuffled order, producing long paths.
    #[weight(2)]
    Chain,
    /// Every node linked to a few hubs, concentrating contention on one root.
    #[weight(2)]
    Star,
    /// Random pairs, each repeated in both directions.
    #[weight(1)]
    Redundant,
}

/// Nodes and the pairs to link between them.
#[derive(Clone, Debug)]
pub(super) struct LinkFixture {
    pub weights: Vec<NodeWeight>,
    pub special: Vec<bool>,
    pub pairs: Vec<(NodeId, NodeId)>,
    pub pattern: LinkPattern,
}
