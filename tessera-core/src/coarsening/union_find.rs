//! Lock-free weighted union-find used to grow clusters during coarsening.
//!
//! Every slot holds one signed integer. A negative value marks a
//! representative and stores the negated weight of its set; a non-negative
//! value is the parent's node id. Linking attaches the lighter root under the
//! heavier one with a single compare-and-swap on the lighter root's slot and
//! then folds the weight into the surviving root with a retry loop, because
//! other links may target the same root concurrently.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use crate::types::{NodeId, NodeWeight};

/// Outcome of a bounded link attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkOutcome {
    /// Two distinct sets were merged.
    Merged,
    /// Both nodes already shared a representative.
    AlreadyLinked,
    /// The merged weight would exceed the requested bound.
    TooHeavy,
}

/// Concurrent disjoint-set forest with set weights and a "contains special
/// vertex" flag.
///
/// Node weights must be strictly positive so that the root encoding stays
/// unambiguous.
///
/// # Examples
/// ```
/// use tessera_core::WeightedConcurrentUnionFind;
///
/// let uf = WeightedConcurrentUnionFind::new(&[1, 2, 3], &[false, false, true]);
/// assert!(uf.link(0, 1));
/// assert!(uf.link(1, 2));
/// assert!(!uf.link(0, 2));
/// assert_eq!(uf.num_distinct_sets(), 1);
/// assert_eq!(uf.weight(0), 6);
/// assert!(uf.contains_special_vertex(0));
/// ```
#[derive(Debug)]
pub struct WeightedConcurrentUnionFind {
    slots: Vec<AtomicI64>,
    special: Vec<AtomicBool>,
    distinct_sets: AtomicUsize,
}

impl WeightedConcurrentUnionFind {
    /// Creates one singleton set per entry of `weights`.
    ///
    /// `special` marks the nodes whose sets should report
    /// [`Self::contains_special_vertex`]; it must have the same length.
    #[must_use]
    pub fn new(weights: &[NodeWeight], special: &[bool]) -> Self {
        debug_assert_eq!(weights.len(), special.len());
        debug_assert!(weights.iter().all(|&w| w > 0), "weights must be positive");
        Self {
            slots: weights.iter().map(|&w| AtomicI64::new(-w)).collect(),
            special: special.iter().map(|&flag| AtomicBool::new(flag)).collect(),
            distinct_sets: AtomicUsize::new(weights.len()),
        }
    }

    /// Returns the number of nodes.
    #[must_use]
    #[rustfmt::skip]
    pub fn len(&self) -> usize { self.slots.len() }

    /// Returns `true` when the structure holds no nodes.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Returns the current number of sets.
    #[must_use]
    pub fn num_distinct_sets(&self) -> usize {
        self.distinct_sets.load(Ordering::Acquire)
    }

    /// Merges the sets containing `u` and `v`.
    ///
    /// Returns `true` when this call merged two distinct sets.
    pub fn link(&self, u: NodeId, v: NodeId) -> bool {
        self.link_bounded(u, v, NodeWeight::MAX) == LinkOutcome::Merged
    }

    /// Merges the sets containing `u` and `v` unless their combined weight,
    /// as observed when linking, exceeds `max_weight`.
    pub fn link_bounded(&self, u: NodeId, v: NodeId, max_weight: NodeWeight) -> LinkOutcome {
        loop {
            let root_u = self.find(u);
            let weight_u = self.slot(root_u).load(Ordering::Acquire);
            let root_v = self.find(v);
            let weight_v = self.slot(root_v).load(Ordering::Acquire);

            // A root may have been attached between find and load.
            if weight_u >= 0 || weight_v >= 0 {
                continue;
            }
            if root_u == root_v {
                return LinkOutcome::AlreadyLinked;
            }
            if -(weight_u + weight_v) > max_weight {
                return LinkOutcome::TooHeavy;
            }

            // Ties attach v under u.
            let (child, child_weight, parent_root, parent_node) = if weight_u > weight_v {
                (root_u, weight_u, root_v, v)
            } else {
                (root_v, weight_v, root_u, u)
            };
            if self
                .slot(child)
                .compare_exchange(
                    child_weight,
                    i64::from(parent_root),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
            {
                continue;
            }
            let parent = self.fold_weight(parent_node, child_weight);
            if self.special[child as usize].load(Ordering::Acquire) {
                self.special[parent as usize].fetch_or(true, Ordering::AcqRel);
            }
            self.distinct_sets.fetch_sub(1, Ordering::AcqRel);
            return LinkOutcome::Merged;
        }
    }

    /// Returns the representative of `u`, compressing the path behind it.
    pub fn find(&self, u: NodeId) -> NodeId {
        let parent = self.slot(u).load(Ordering::Acquire);
        if parent < 0 {
            return u;
        }
        let parent = parent as NodeId;
        let root = self.find(parent);
        if parent != root {
            // Losing this race only means another thread compressed first.
            let _ = self.slot(u).compare_exchange(
                i64::from(parent),
                i64::from(root),
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
        root
    }

    /// Returns `true` when `u` and `v` share a representative.
    pub fn is_same_set(&self, u: NodeId, v: NodeId) -> bool {
        self.find(u) == self.find(v)
    }

    /// Returns the aggregate weight of the set containing `u`.
    pub fn weight(&self, u: NodeId) -> NodeWeight {
        loop {
            let value = self.slot(self.find(u)).load(Ordering::Acquire);
            if value < 0 {
                return -value;
            }
        }
    }

    /// Returns `true` when the set containing `u` holds a special vertex.
    pub fn contains_special_vertex(&self, u: NodeId) -> bool {
        self.special[self.find(u) as usize].load(Ordering::Acquire)
    }

    /// Adds the (negative) `child_weight` to the current root of `node` and
    /// returns that root.
    fn fold_weight(&self, node: NodeId, child_weight: i64) -> NodeId {
        loop {
            let root = self.find(node);
            let root_weight = self.slot(root).load(Ordering::Acquire);
            if root_weight >= 0 {
                continue;
            }
            if self
                .slot(root)
                .compare_exchange(
                    root_weight,
                    root_weight + child_weight,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return root;
            }
        }
    }

    #[inline]
    fn slot(&self, u: NodeId) -> &AtomicI64 {
        &self.slots[u as usize]
    }
}

#[cfg(kani)]
mod kani_proofs {
    use super::WeightedConcurrentUnionFind;

    /// Verifies the linking rule on three nodes with arbitrary positive
    /// weights: the heavier root survives and set weights are conserved.
    #[kani::proof]
    #[kani::unwind(6)]
    fn verify_weighted_link_three_nodes() {
        let w0: i64 = kani::any();
        let w1: i64 = kani::any();
        let w2: i64 = kani::any();
        kani::assume(w0 > 0 && w0 < 16);
        kani::assume(w1 > 0 && w1 < 16);
        kani::assume(w2 > 0 && w2 < 16);
        let uf = WeightedConcurrentUnionFind::new(&[w0, w1, w2], &[false, true, false]);

        kani::assert(uf.link(0, 1), "first link merges two singletons");
        let root = uf.find(0);
        if w0 >= w1 {
            kani::assert(root == 0, "heavier or tied left root survives");
        } else {
            kani::assert(root == 1, "heavier right root survives");
        }
        kani::assert(uf.link(2, 1), "second link merges the remaining singleton");
        kani::assert(uf.num_distinct_sets() == 1, "one set remains");
        kani::assert(uf.weight(2) == w0 + w1 + w2, "weight is conserved");
        kani::assert(uf.contains_special_vertex(0), "special flag propagates");
    }
}
