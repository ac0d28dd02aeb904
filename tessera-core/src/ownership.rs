//! Exclusive node claims for concurrent searches.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::types::{NodeId, SearchId};

const UNOWNED: SearchId = SearchId::MAX;

/// One atomic owner tag per node.
///
/// A node belongs to at most one search at a time; claiming is a single
/// compare-and-swap from the unowned sentinel.
///
/// # Examples
/// ```
/// use tessera_core::NodeOwnership;
///
/// let ownership = NodeOwnership::new(2);
/// assert!(ownership.try_acquire(0, 7));
/// assert!(!ownership.try_acquire(0, 8));
/// assert_eq!(ownership.owner(0), Some(7));
/// assert!(ownership.release(0, 7));
/// assert_eq!(ownership.owner(0), None);
/// ```
#[derive(Debug)]
pub struct NodeOwnership {
    owners: Vec<AtomicU32>,
}

impl NodeOwnership {
    /// Creates tags for `num_nodes` unowned nodes.
    #[must_use]
    pub fn new(num_nodes: usize) -> Self {
        Self {
            owners: (0..num_nodes).map(|_| AtomicU32::new(UNOWNED)).collect(),
        }
    }

    /// Claims `u` for `search`; fails if any search, including `search`,
    /// already owns it.
    pub fn try_acquire(&self, u: NodeId, search: SearchId) -> bool {
        debug_assert_ne!(search, UNOWNED, "search id collides with the unowned sentinel");
        self.owners[u as usize]
            .compare_exchange(UNOWNED, search, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Gives `u` back if `search` owns it.
    pub fn release(&self, u: NodeId, search: SearchId) -> bool {
        self.owners[u as usize]
            .compare_exchange(search, UNOWNED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns the search currently owning `u`.
    #[must_use]
    pub fn owner(&self, u: NodeId) -> Option<SearchId> {
        let owner = self.owners[u as usize].load(Ordering::Acquire);
        (owner != UNOWNED).then_some(owner)
    }

    /// Releases every node.
    pub fn reset(&self) {
        self.owners
            .par_iter()
            .for_each(|owner| owner.store(UNOWNED, Ordering::Release));
    }
}
