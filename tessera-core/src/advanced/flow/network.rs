//! Residual flow network built from a two-block region.

use std::collections::{HashMap, VecDeque};

use crate::{
    advanced::construction::Subproblem,
    hypergraph::{PartitionView, PartitionedHypergraph},
    types::{EdgeId, EdgeWeight, NodeId, NodeWeight},
};

/// Arc capacity.
pub type Capacity = i64;

/// Capacity of arcs that must never be cut.
pub const INFINITE_CAPACITY: Capacity = Capacity::MAX / 4;

#[derive(Clone, Copy, Debug)]
struct Arc {
    head: usize,
    capacity: Capacity,
    flow: Capacity,
}

/// Directed network with paired residual arcs.
///
/// Arc `a` and arc `a ^ 1` are reverses of each other. Every node carries the
/// weight of the hypergraph nodes it stands for, so a cut can be judged by
/// the block weights it induces.
#[derive(Clone, Debug, Default)]
pub struct FlowNetwork {
    arcs: Vec<Arc>,
    adjacency: Vec<Vec<usize>>,
    node_weights: Vec<NodeWeight>,
    source: usize,
    sink: usize,
}

impl FlowNetwork {
    /// Creates a network containing only a source and a sink of the given
    /// weights.
    #[must_use]
    pub fn new(source_weight: NodeWeight, sink_weight: NodeWeight) -> Self {
        let mut network = Self::default();
        network.source = network.add_node(source_weight);
        network.sink = network.add_node(sink_weight);
        network
    }

    /// Adds a node and returns its index.
    pub fn add_node(&mut self, weight: NodeWeight) -> usize {
        self.adjacency.push(Vec::new());
        self.node_weights.push(weight);
        self.adjacency.len() - 1
    }

    /// Adds `tail → head` with `capacity` and `head → tail` with
    /// `reverse_capacity` as one residual pair.
    pub fn add_arc_pair(
        &mut self,
        tail: usize,
        head: usize,
        capacity: Capacity,
        reverse_capacity: Capacity,
    ) {
        let index = self.arcs.len();
        self.arcs.push(Arc {
            head,
            capacity,
            flow: 0,
        });
        self.arcs.push(Arc {
            head: tail,
            capacity: reverse_capacity,
            flow: 0,
        });
        self.adjacency[tail].push(index);
        self.adjacency[head].push(index + 1);
    }

    /// Returns the source index.
    #[must_use]
    #[rustfmt::skip]
    pub fn source(&self) -> usize { self.source }

    /// Returns the sink index.
    #[must_use]
    #[rustfmt::skip]
    pub fn sink(&self) -> usize { self.sink }

    /// Returns the number of nodes, terminals included.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    /// Returns the weight of node `v`.
    #[must_use]
    pub fn node_weight(&self, v: usize) -> NodeWeight {
        self.node_weights[v]
    }

    /// Arcs leaving `v`, as arc indices.
    #[must_use]
    pub fn out_arcs(&self, v: usize) -> &[usize] {
        &self.adjacency[v]
    }

    /// Head of arc `a`.
    #[must_use]
    pub fn head(&self, a: usize) -> usize {
        self.arcs[a].head
    }

    /// Capacity left on arc `a`.
    #[must_use]
    pub fn residual(&self, a: usize) -> Capacity {
        self.arcs[a].capacity - self.arcs[a].flow
    }

    /// Pushes `amount` along arc `a`.
    pub fn push(&mut self, a: usize, amount: Capacity) {
        debug_assert!(amount <= self.residual(a));
        self.arcs[a].flow += amount;
        self.arcs[a ^ 1].flow -= amount;
    }

    /// Net flow leaving the source.
    #[must_use]
    pub fn flow_value(&self) -> Capacity {
        self.adjacency[self.source]
            .iter()
            .map(|&a| self.arcs[a].flow)
            .sum()
    }

    /// Nodes reachable from the source in the residual network: the smallest
    /// source side of a minimum cut once the flow is maximum.
    #[must_use]
    pub fn source_side(&self) -> Vec<bool> {
        self.residual_closure(self.source, |network, a| (a, network.head(a)))
    }

    /// Complement of the nodes that reach the sink in the residual network:
    /// the largest source side of a minimum cut once the flow is maximum.
    #[must_use]
    pub fn largest_source_side(&self) -> Vec<bool> {
        let reaches_sink = self.residual_closure(self.sink, |network, a| (a ^ 1, network.head(a)));
        reaches_sink.into_iter().map(|reaches| !reaches).collect()
    }

    /// Breadth-first closure from `start`. `step` maps an arc leaving the
    /// current node to the arc whose residual decides traversal and the node
    /// reached.
    fn residual_closure(&self, start: usize, step: impl Fn(&Self, usize) -> (usize, usize)) -> Vec<bool> {
        let mut seen = vec![false; self.num_nodes()];
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        while let Some(v) = queue.pop_front() {
            for &a in &self.adjacency[v] {
                let (decisive, next) = step(self, a);
                if !seen[next] && self.residual(decisive) > 0 {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        seen
    }
}

/// A region translated into a flow network.
///
/// Pins of block 0 outside the region collapse into the source, pins of block
/// 1 into the sink. Edges touching both terminals cannot leave the cut and
/// only count toward `non_removable_cut`.
#[derive(Clone, Debug)]
pub struct FlowProblem {
    /// The network; region node `i` is network node `i + 2`.
    pub network: FlowNetwork,
    /// Region nodes in network order.
    pub nodes: Vec<NodeId>,
    /// Weight of the region's edges currently cut between the two blocks.
    pub total_cut: EdgeWeight,
    /// Part of `total_cut` no flow cut can remove.
    pub non_removable_cut: EdgeWeight,
    /// Current weight of block 0.
    pub weight_of_block_0: NodeWeight,
    /// Current weight of block 1.
    pub weight_of_block_1: NodeWeight,
}

impl FlowProblem {
    /// Builds the network of `subproblem`. Two-pin edges become a pair of
    /// opposite arcs; larger edges use the Lawler expansion (an in node and
    /// an out node joined by an arc of the edge weight).
    #[must_use]
    pub fn build(phg: &PartitionedHypergraph, subproblem: &Subproblem) -> Self {
        let hg = phg.hypergraph();
        let pair = subproblem.pair;
        let weight_of_block_0 = phg.part_weight(pair.block_0);
        let weight_of_block_1 = phg.part_weight(pair.block_1);
        let mut network = FlowNetwork::new(
            weight_of_block_0 - subproblem.stats.block_weight(pair.block_0),
            weight_of_block_1 - subproblem.stats.block_weight(pair.block_1),
        );
        let (source, sink) = (network.source(), network.sink());

        let mut index_of: HashMap<NodeId, usize> = HashMap::with_capacity(subproblem.nodes.len());
        for &u in &subproblem.nodes {
            index_of.insert(u, network.add_node(hg.node_weight(u)));
        }
        let mut edges: Vec<EdgeId> = subproblem
            .nodes
            .iter()
            .flat_map(|&u| hg.incident_edges(u).iter().copied())
            .collect();
        edges.sort_unstable();
        edges.dedup();

        let (mut total_cut, mut non_removable_cut) = (0, 0);
        let mut endpoints = Vec::new();
        for e in edges {
            let weight = hg.edge_weight(e);
            if phg.pin_count_in_part(e, pair.block_0) > 0 && phg.pin_count_in_part(e, pair.block_1) > 0 {
                total_cut += weight;
            }
            endpoints.clear();
            endpoints.extend(hg.pins(e).iter().filter_map(|pin| {
                index_of.get(pin).copied().or_else(|| {
                    let block = phg.part_id(*pin);
                    if block == pair.block_0 {
                        Some(source)
                    } else if block == pair.block_1 {
                        Some(sink)
                    } else {
                        None
                    }
                })
            }));
            endpoints.sort_unstable();
            endpoints.dedup();

            if endpoints.contains(&source) && endpoints.contains(&sink) {
                non_removable_cut += weight;
                continue;
            }
            match endpoints.as_slice() {
                [] | [_] => {}
                &[u, v] => network.add_arc_pair(u, v, weight, weight),
                pins => {
                    let edge_in = network.add_node(0);
                    let edge_out = network.add_node(0);
                    network.add_arc_pair(edge_in, edge_out, weight, 0);
                    for &p in pins {
                        network.add_arc_pair(p, edge_in, INFINITE_CAPACITY, 0);
                        network.add_arc_pair(edge_out, p, INFINITE_CAPACITY, 0);
                    }
                }
            }
        }

        Self {
            network,
            nodes: subproblem.nodes.clone(),
            total_cut,
            non_removable_cut,
            weight_of_block_0,
            weight_of_block_1,
        }
    }
}
