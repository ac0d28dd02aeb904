//! Parallel cluster formation for contraction.
//!
//! Coarsening proposes node pairs (typically from a rating function) and links
//! them concurrently through [`WeightedConcurrentUnionFind`]. The resulting
//! sets become the nodes of the next coarser level.

mod union_find;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::{
    hypergraph::Hypergraph,
    types::{NodeId, NodeWeight},
};

pub use self::union_find::{LinkOutcome, WeightedConcurrentUnionFind};

/// Compact cluster assignment produced by [`cluster_pairs`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Clustering {
    cluster_of: Vec<NodeId>,
    cluster_weights: Vec<NodeWeight>,
    contains_special: Vec<bool>,
}

impl Clustering {
    /// Returns the number of clusters.
    #[must_use]
    #[rustfmt::skip]
    pub fn num_clusters(&self) -> usize { self.cluster_weights.len() }

    /// Returns the cluster id of node `u`; ids are dense in `0..num_clusters`.
    #[must_use]
    pub fn cluster_of(&self, u: NodeId) -> NodeId {
        self.cluster_of[u as usize]
    }

    /// Returns the cluster id of every node.
    #[must_use]
    #[rustfmt::skip]
    pub fn assignment(&self) -> &[NodeId] { &self.cluster_of }

    /// Returns the aggregate node weight of cluster `c`.
    #[must_use]
    pub fn cluster_weight(&self, c: NodeId) -> NodeWeight {
        self.cluster_weights[c as usize]
    }

    /// Returns `true` when cluster `c` holds a high-degree node.
    #[must_use]
    pub fn contains_special_vertex(&self, c: NodeId) -> bool {
        self.contains_special[c as usize]
    }
}

/// Links the proposed `pairs` in parallel and returns the resulting clusters.
///
/// A pair is skipped when the merged cluster would weigh more than
/// `max_cluster_weight` or when both sides already contain a node whose degree
/// exceeds `high_degree_threshold`.
///
/// # Examples
/// ```
/// use tessera_core::{Hypergraph, cluster_pairs};
///
/// let hg = Hypergraph::with_unit_weights(4, [vec![0, 1], vec![2, 3]]).expect("valid hypergraph");
/// let clustering = cluster_pairs(&hg, &[(0, 1), (2, 3), (1, 2)], 2, usize::MAX);
/// assert_eq!(clustering.num_clusters(), 2);
/// assert_eq!(clustering.cluster_of(0), clustering.cluster_of(1));
/// assert_ne!(clustering.cluster_of(1), clustering.cluster_of(2));
/// ```
#[instrument(name = "coarsening.cluster_pairs", skip(hypergraph, pairs), fields(nodes = hypergraph.num_nodes(), pairs = pairs.len()))]
pub fn cluster_pairs(
    hypergraph: &Hypergraph,
    pairs: &[(NodeId, NodeId)],
    max_cluster_weight: NodeWeight,
    high_degree_threshold: usize,
) -> Clustering {
    let weights: Vec<NodeWeight> = hypergraph.nodes().map(|u| hypergraph.node_weight(u)).collect();
    let special: Vec<bool> = hypergraph
        .nodes()
        .map(|u| hypergraph.node_degree(u) > high_degree_threshold)
        .collect();
    let union_find = WeightedConcurrentUnionFind::new(&weights, &special);

    let merged = pairs
        .par_iter()
        .filter(|&&(u, v)| {
            if union_find.contains_special_vertex(u) && union_find.contains_special_vertex(v) {
                return false;
            }
            union_find.link_bounded(u, v, max_cluster_weight) == LinkOutcome::Merged
        })
        .count();

    let mut cluster_of = vec![0; union_find.len()];
    let mut cluster_weights = Vec::with_capacity(union_find.num_distinct_sets());
    let mut contains_special = Vec::with_capacity(union_find.num_distinct_sets());
    let mut dense = vec![NodeId::MAX; union_find.len()];
    for u in hypergraph.nodes() {
        let root = union_find.find(u) as usize;
        if dense[root] == NodeId::MAX {
            dense[root] = cluster_weights.len() as NodeId;
            cluster_weights.push(union_find.weight(u));
            contains_special.push(union_find.contains_special_vertex(u));
        }
        cluster_of[u as usize] = dense[root];
    }

    debug!(merged, clusters = cluster_weights.len(), "linked proposed pairs");
    Clustering {
        cluster_of,
        cluster_weights,
        contains_special,
    }
}

#[cfg(test)]
mod tests;
