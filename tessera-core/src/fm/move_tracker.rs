//! Globally ordered log of committed moves.
//!
//! Workers commit moves concurrently; each commit draws the next [`MoveId`]
//! from a shared counter, so the log order is the global commit order. IDs
//! below `first_move_id` belong to an earlier phase and are stale. A phase
//! ends with [`GlobalMoveTracker::reset`], which advances `first_move_id` past
//! every ID handed out so far.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crate::types::{INVALID_GAIN, Move, MoveId, NodeId};

/// Sentinel meaning "no move recorded for this node".
const NO_MOVE: MoveId = 0;

#[derive(Debug, Default)]
struct MoveSlot {
    node: AtomicU32,
    from: AtomicU32,
    to: AtomicU32,
    gain: AtomicI64,
}

impl MoveSlot {
    fn store(&self, mv: Move) {
        self.node.store(mv.node, Ordering::Relaxed);
        self.from.store(mv.from, Ordering::Relaxed);
        self.to.store(mv.to, Ordering::Relaxed);
        self.gain.store(mv.gain, Ordering::Release);
    }

    fn load(&self) -> Move {
        Move {
            gain: self.gain.load(Ordering::Acquire),
            node: self.node.load(Ordering::Relaxed),
            from: self.from.load(Ordering::Relaxed),
            to: self.to.load(Ordering::Relaxed),
        }
    }
}

/// Append-only, generation-stamped move log shared by all FM workers.
///
/// Between two resets every node takes at most one slot, reverted moves
/// included, so the log never holds more than `num_nodes` moves.
///
/// # Examples
/// ```
/// use tessera_core::{GlobalMoveTracker, Move};
///
/// let mut tracker = GlobalMoveTracker::new(4);
/// let id = tracker.insert_move(Move::new(2, 0, 1, 5));
/// assert_eq!(tracker.num_performed_moves(), 1);
/// assert_eq!(tracker.get_move(id).gain, 5);
///
/// assert!(!tracker.reset());
/// assert!(tracker.is_move_stale(id));
/// assert_eq!(tracker.num_performed_moves(), 0);
/// ```
#[derive(Debug)]
pub struct GlobalMoveTracker {
    slots: Vec<MoveSlot>,
    move_of_node: Vec<AtomicU32>,
    first_move_id: MoveId,
    running_move_id: AtomicU32,
}

impl GlobalMoveTracker {
    /// Creates an empty log for a hypergraph with `num_nodes` nodes.
    #[must_use]
    pub fn new(num_nodes: usize) -> Self {
        Self {
            slots: (0..num_nodes).map(|_| MoveSlot::default()).collect(),
            move_of_node: (0..num_nodes).map(|_| AtomicU32::new(NO_MOVE)).collect(),
            first_move_id: 1,
            running_move_id: AtomicU32::new(1),
        }
    }

    /// Appends `mv` and returns its global ID.
    pub fn insert_move(&self, mv: Move) -> MoveId {
        let id = self.running_move_id.fetch_add(1, Ordering::AcqRel);
        let local = (id - self.first_move_id) as usize;
        debug_assert!(local < self.slots.len(), "more moves than nodes in one phase");
        self.slots[local].store(mv);
        self.move_of_node[mv.node as usize].store(id, Ordering::Release);
        id
    }

    /// Returns the move with global ID `id` of the current phase.
    #[must_use]
    pub fn get_move(&self, id: MoveId) -> Move {
        debug_assert!(!self.is_move_stale(id), "move {id} is stale");
        self.slots[(id - self.first_move_id) as usize].load()
    }

    /// Marks the move with global ID `id` as locally reverted.
    pub fn invalidate(&self, id: MoveId) {
        debug_assert!(!self.is_move_stale(id), "move {id} is stale");
        self.slots[(id - self.first_move_id) as usize]
            .gain
            .store(INVALID_GAIN, Ordering::Release);
    }

    /// Returns the ID of the first move of the current phase.
    #[must_use]
    #[rustfmt::skip]
    pub fn first_move_id(&self) -> MoveId { self.first_move_id }

    /// Returns the number of moves committed in the current phase.
    #[must_use]
    pub fn num_performed_moves(&self) -> usize {
        (self.running_move_id.load(Ordering::Acquire) - self.first_move_id) as usize
    }

    /// Returns `true` when `id` was handed out before the last reset.
    #[must_use]
    #[inline]
    pub fn is_move_stale(&self, id: MoveId) -> bool {
        id < self.first_move_id
    }

    /// Returns `true` when `id` belongs to the current phase and the move was
    /// not reverted locally.
    #[must_use]
    pub fn is_move_still_valid(&self, id: MoveId) -> bool {
        !self.is_move_stale(id)
            && id < self.running_move_id.load(Ordering::Acquire)
            && self.get_move(id).is_valid()
    }

    /// Returns the ID of the latest move of `u`, which may be stale.
    #[must_use]
    pub fn move_of_node(&self, u: NodeId) -> MoveId {
        self.move_of_node[u as usize].load(Ordering::Acquire)
    }

    /// Returns the moves of the current phase in commit order.
    #[must_use]
    pub fn moves(&self) -> Vec<Move> {
        self.slots[..self.num_performed_moves()]
            .iter()
            .map(MoveSlot::load)
            .collect()
    }

    /// Ends the current phase.
    ///
    /// Returns `true` when the ID space was exhausted and restarted; callers
    /// holding move IDs outside the tracker must then clear them.
    pub fn reset(&mut self) -> bool {
        let running = *self.running_move_id.get_mut();
        if running >= MoveId::MAX - self.slots.len() as MoveId - 1 {
            for entry in &mut self.move_of_node {
                *entry.get_mut() = NO_MOVE;
            }
            self.first_move_id = 1;
            *self.running_move_id.get_mut() = 1;
            true
        } else {
            self.first_move_id = running;
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn set_running_move_id_for_test(&mut self, id: MoveId) {
        self.first_move_id = id;
        *self.running_move_id.get_mut() = id;
    }
}
