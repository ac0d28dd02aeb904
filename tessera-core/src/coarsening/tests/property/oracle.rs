//! Single-threaded disjoint-set forest used as the reference.

use crate::types::{NodeId, NodeWeight};

pub(super) struct SequentialUnionFind {
    parent: Vec<usize>,
    weight: Vec<NodeWeight>,
    special: Vec<bool>,
}

impl SequentialUnionFind {
    pub(super) fn new(weights: &[NodeWeight], special: &[bool]) -> Self {
        Self {
            parent: (0..weights.len()).collect(),
            weight: weights.to_vec(),
            special: special.to_vec(),
        }
    }

    fn root(&mut self, u: NodeId) -> usize {
        let mut current = u as usize;
        while self.parent[current] != current {
            self.parent[current] = self.parent[self.parent[current]];
            current = self.parent[current];
        }
        current
    }

    pub(super) fn union(&mut self, u: NodeId, v: NodeId) -> bool {
        let (ru, rv) = (self.root(u), self.root(v));
        if ru == rv {
            return false;
        }
        let (child, parent) = if self.weight[ru] < self.weight[rv] { (ru, rv) } else { (rv, ru) };
        self.parent[child] = parent;
        self.weight[parent] += self.weight[child];
        self.special[parent] |= self.special[child];
        true
    }

    pub(super) fn weight(&mut self, u: NodeId) -> NodeWeight {
        let root = self.root(u);
        self.weight[root]
    }

    pub(super) fn special(&mut self, u: NodeId) -> bool {
        let root = self.root(u);
        self.special[root]
    }

    pub(super) fn same_set(&mut self, u: NodeId, v: NodeId) -> bool {
        self.root(u) == self.root(v)
    }
}
