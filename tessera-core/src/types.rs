//! Identifier, weight and move types shared across the refinement core.

/// Index of a node in a [`crate::Hypergraph`].
pub type NodeId = u32;
/// Index of an edge in a [`crate::Hypergraph`].
pub type EdgeId = u32;
/// Index of a block of a partition.
pub type BlockId = u32;
/// Weight of a node or of a block.
pub type NodeWeight = i64;
/// Weight of an edge.
pub type EdgeWeight = i64;
/// Objective improvement of a move; positive values are improvements.
pub type Gain = i64;
/// Globally ordered identifier handed out by the [`crate::GlobalMoveTracker`].
pub type MoveId = u32;
/// Identifier of one concurrent region-construction search.
pub type SearchId = u32;

/// Sentinel for "no block".
pub const INVALID_BLOCK: BlockId = BlockId::MAX;
/// Sentinel gain marking a move that was reverted locally.
pub const INVALID_GAIN: Gain = Gain::MIN;

/// A single node move between two blocks.
///
/// # Examples
/// ```
/// use tessera_core::{INVALID_GAIN, Move};
///
/// let mv = Move::new(3, 0, 1, 2);
/// assert!(mv.is_valid());
/// assert!(!Move::new(3, 0, 1, INVALID_GAIN).is_valid());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Move {
    /// Node being moved.
    pub node: NodeId,
    /// Block the node leaves.
    pub from: BlockId,
    /// Block the node enters.
    pub to: BlockId,
    /// Gain of the move, or [`INVALID_GAIN`] if the move was reverted.
    pub gain: Gain,
}

impl Move {
    /// Creates a move record.
    #[must_use]
    pub const fn new(node: NodeId, from: BlockId, to: BlockId, gain: Gain) -> Self {
        Self {
            node,
            from,
            to,
            gain,
        }
    }

    /// Returns `false` once the move has been invalidated by a local revert.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.gain != INVALID_GAIN
    }

    /// Marks the move as reverted.
    pub fn invalidate(&mut self) {
        self.gain = INVALID_GAIN;
    }
}

impl Default for Move {
    fn default() -> Self {
        Self::new(0, INVALID_BLOCK, INVALID_BLOCK, INVALID_GAIN)
    }
}
