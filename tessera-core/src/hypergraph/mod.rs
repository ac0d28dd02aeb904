//! Static hypergraph storage and its concurrently mutable partition.
//!
//! The refinement core only needs a narrow view of the structure it improves:
//! node and edge weights, pins of an edge, incident edges of a node, and the
//! block-induced counters maintained by [`PartitionedHypergraph`]. Storage is
//! compressed (CSR) in both directions so every query is a slice borrow.

mod partitioned;

use std::ops::Range;

use crate::{
    error::HypergraphError,
    types::{EdgeId, EdgeWeight, NodeId, NodeWeight},
};

pub use self::partitioned::{EdgeUpdate, PartitionView, PartitionedHypergraph};

/// Immutable hypergraph in compressed sparse row layout.
///
/// Plain graphs are hypergraphs whose edges all have exactly two pins; the
/// graph-specific helpers ([`Hypergraph::edge_target`], [`Hypergraph::is_graph`])
/// only make sense for that case.
///
/// # Examples
/// ```
/// use tessera_core::Hypergraph;
///
/// let hg = Hypergraph::new(vec![1, 1, 2], vec![(vec![0, 1], 3), (vec![0, 1, 2], 1)])
///     .expect("valid hypergraph");
/// assert_eq!(hg.num_nodes(), 3);
/// assert_eq!(hg.total_weight(), 4);
/// assert_eq!(hg.pins(1), &[0, 1, 2]);
/// assert!(!hg.is_graph());
/// ```
#[derive(Clone, Debug)]
pub struct Hypergraph {
    node_weights: Vec<NodeWeight>,
    edge_weights: Vec<EdgeWeight>,
    pin_offsets: Vec<usize>,
    pins: Vec<NodeId>,
    incidence_offsets: Vec<usize>,
    incident_edges: Vec<EdgeId>,
    total_weight: NodeWeight,
    max_edge_size: usize,
}

impl Hypergraph {
    /// Builds a hypergraph from node weights and `(pins, weight)` edges.
    ///
    /// Duplicate pins inside one edge are collapsed.
    ///
    /// # Errors
    /// Returns [`HypergraphError::Empty`] for an empty node set,
    /// [`HypergraphError::ZeroNodeWeight`] when a node weight is not positive,
    /// [`HypergraphError::InvalidPin`] when a pin is out of range and
    /// [`HypergraphError::DegenerateEdge`] when an edge has fewer than two
    /// distinct pins.
    pub fn new(
        node_weights: Vec<NodeWeight>,
        edges: Vec<(Vec<NodeId>, EdgeWeight)>,
    ) -> Result<Self, HypergraphError> {
        let node_count = node_weights.len();
        if node_count == 0 {
            return Err(HypergraphError::Empty);
        }
        if let Some(node) = node_weights.iter().position(|&weight| weight <= 0) {
            return Err(HypergraphError::ZeroNodeWeight { node: node as NodeId });
        }

        let mut pin_offsets = Vec::with_capacity(edges.len() + 1);
        let mut pins = Vec::new();
        let mut edge_weights = Vec::with_capacity(edges.len());
        let mut degrees = vec![0_usize; node_count];
        let mut max_edge_size = 0;
        pin_offsets.push(0);

        for (edge, (mut edge_pins, weight)) in edges.into_iter().enumerate() {
            let edge = edge as EdgeId;
            if let Some(&node) = edge_pins.iter().find(|&&pin| pin as usize >= node_count) {
                return Err(HypergraphError::InvalidPin {
                    edge,
                    node,
                    node_count,
                });
            }
            edge_pins.sort_unstable();
            edge_pins.dedup();
            if edge_pins.len() < 2 {
                return Err(HypergraphError::DegenerateEdge {
                    edge,
                    pins: edge_pins.len(),
                });
            }
            max_edge_size = max_edge_size.max(edge_pins.len());
            for &pin in &edge_pins {
                degrees[pin as usize] += 1;
            }
            pins.extend_from_slice(&edge_pins);
            pin_offsets.push(pins.len());
            edge_weights.push(weight);
        }

        let mut incidence_offsets = Vec::with_capacity(node_count + 1);
        incidence_offsets.push(0);
        for degree in &degrees {
            let last = incidence_offsets.last().copied().unwrap_or(0);
            incidence_offsets.push(last + degree);
        }
        let mut cursor = incidence_offsets[..node_count].to_vec();
        let mut incident_edges = vec![0; pins.len()];
        for edge in 0..edge_weights.len() {
            for &pin in &pins[pin_offsets[edge]..pin_offsets[edge + 1]] {
                let slot = &mut cursor[pin as usize];
                incident_edges[*slot] = edge as EdgeId;
                *slot += 1;
            }
        }

        let total_weight = node_weights.iter().sum();
        Ok(Self {
            node_weights,
            edge_weights,
            pin_offsets,
            pins,
            incidence_offsets,
            incident_edges,
            total_weight,
            max_edge_size,
        })
    }

    /// Builds a hypergraph with unit node and edge weights.
    ///
    /// # Errors
    /// Same as [`Hypergraph::new`].
    pub fn with_unit_weights(
        node_count: usize,
        edges: impl IntoIterator<Item = Vec<NodeId>>,
    ) -> Result<Self, HypergraphError> {
        Self::new(
            vec![1; node_count],
            edges.into_iter().map(|pins| (pins, 1)).collect(),
        )
    }

    /// Returns the number of nodes.
    #[must_use]
    #[rustfmt::skip]
    pub fn num_nodes(&self) -> usize { self.node_weights.len() }

    /// Returns the number of edges.
    #[must_use]
    #[rustfmt::skip]
    pub fn num_edges(&self) -> usize { self.edge_weights.len() }

    /// Returns the total number of pins.
    #[must_use]
    #[rustfmt::skip]
    pub fn num_pins(&self) -> usize { self.pins.len() }

    /// Returns the node ids as a range.
    #[must_use]
    pub fn nodes(&self) -> Range<NodeId> {
        0..self.num_nodes() as NodeId
    }

    /// Returns the edge ids as a range.
    #[must_use]
    pub fn edges(&self) -> Range<EdgeId> {
        0..self.num_edges() as EdgeId
    }

    /// Returns the weight of node `u`.
    #[must_use]
    #[inline]
    pub fn node_weight(&self, u: NodeId) -> NodeWeight {
        self.node_weights[u as usize]
    }

    /// Returns the weight of edge `e`.
    #[must_use]
    #[inline]
    pub fn edge_weight(&self, e: EdgeId) -> EdgeWeight {
        self.edge_weights[e as usize]
    }

    /// Returns the pins of edge `e`, sorted by node id.
    #[must_use]
    #[inline]
    pub fn pins(&self, e: EdgeId) -> &[NodeId] {
        let e = e as usize;
        &self.pins[self.pin_offsets[e]..self.pin_offsets[e + 1]]
    }

    /// Returns the number of pins of edge `e`.
    #[must_use]
    #[inline]
    pub fn edge_size(&self, e: EdgeId) -> usize {
        let e = e as usize;
        self.pin_offsets[e + 1] - self.pin_offsets[e]
    }

    /// Returns the edges incident to node `u`.
    #[must_use]
    #[inline]
    pub fn incident_edges(&self, u: NodeId) -> &[EdgeId] {
        let u = u as usize;
        &self.incident_edges[self.incidence_offsets[u]..self.incidence_offsets[u + 1]]
    }

    /// Returns the number of edges incident to node `u`.
    #[must_use]
    pub fn node_degree(&self, u: NodeId) -> usize {
        self.incident_edges(u).len()
    }

    /// Returns the sum of all node weights.
    #[must_use]
    #[rustfmt::skip]
    pub fn total_weight(&self) -> NodeWeight { self.total_weight }

    /// Returns the size of the largest edge.
    #[must_use]
    #[rustfmt::skip]
    pub fn max_edge_size(&self) -> usize { self.max_edge_size }

    /// Returns `true` when every edge has exactly two pins.
    #[must_use]
    pub fn is_graph(&self) -> bool {
        self.max_edge_size <= 2
    }

    /// Returns the pin of the two-pin edge `e` that is not `u`.
    #[must_use]
    #[inline]
    pub fn edge_target(&self, e: EdgeId, u: NodeId) -> NodeId {
        debug_assert_eq!(self.edge_size(e), 2, "edge_target requires a two-pin edge");
        let pins = self.pins(e);
        if pins[0] == u { pins[1] } else { pins[0] }
    }
}
