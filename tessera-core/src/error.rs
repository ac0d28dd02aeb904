//! Error types for the tessera refinement core.
//!
//! Defines error enums exposed by the public API and a convenient result alias.
//! Only input validation is fallible; contract violations inside the hot paths
//! are debug assertions, and recoverable search outcomes (time limits,
//! ownership contention, stale move IDs) are reported through status values.

use std::fmt;

use thiserror::Error;

use crate::types::{BlockId, EdgeId, NodeId};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced while building a [`crate::Hypergraph`] or a
/// [`crate::PartitionedHypergraph`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum HypergraphError {
    /// The hypergraph contained no nodes.
    #[error("hypergraph contains no nodes")]
    Empty,
    /// A node weight was zero; weights must be strictly positive.
    #[error("node {node} has weight zero; node weights must be positive")]
    ZeroNodeWeight {
        /// The offending node.
        node: NodeId,
    },
    /// An edge referenced a node that does not exist.
    #[error("edge {edge} references node {node}, but node_count is {node_count}")]
    InvalidPin {
        /// The edge holding the invalid pin.
        edge: EdgeId,
        /// The invalid node id.
        node: NodeId,
        /// The number of nodes in the hypergraph.
        node_count: usize,
    },
    /// An edge had fewer than two distinct pins.
    #[error("edge {edge} has {pins} distinct pins; at least two are required")]
    DegenerateEdge {
        /// The offending edge.
        edge: EdgeId,
        /// Number of distinct pins found.
        pins: usize,
    },
    /// A partition must contain at least two blocks.
    #[error("a partition needs at least two blocks (got {k})")]
    TooFewBlocks {
        /// The requested number of blocks.
        k: usize,
    },
    /// The block assignment did not cover every node exactly once.
    #[error("block assignment has length {got} but the hypergraph has {expected} nodes")]
    AssignmentLengthMismatch {
        /// Length of the supplied assignment.
        got: usize,
        /// Number of nodes in the hypergraph.
        expected: usize,
    },
    /// A node was assigned to a block outside `0..k`.
    #[error("node {node} is assigned to block {block}, but k is {k}")]
    InvalidBlock {
        /// The node holding the invalid assignment.
        node: NodeId,
        /// The invalid block.
        block: BlockId,
        /// The number of blocks.
        k: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`HypergraphError`] variants.
    enum HypergraphErrorCode for HypergraphError {
        /// The hypergraph contained no nodes.
        Empty => Empty => "HYPERGRAPH_EMPTY",
        /// A node weight was zero.
        ZeroNodeWeight => ZeroNodeWeight { .. } => "HYPERGRAPH_ZERO_NODE_WEIGHT",
        /// An edge referenced a node that does not exist.
        InvalidPin => InvalidPin { .. } => "HYPERGRAPH_INVALID_PIN",
        /// An edge had fewer than two distinct pins.
        DegenerateEdge => DegenerateEdge { .. } => "HYPERGRAPH_DEGENERATE_EDGE",
        /// A partition must contain at least two blocks.
        TooFewBlocks => TooFewBlocks { .. } => "PARTITION_TOO_FEW_BLOCKS",
        /// The block assignment did not cover every node.
        AssignmentLengthMismatch => AssignmentLengthMismatch { .. } => "PARTITION_ASSIGNMENT_LENGTH_MISMATCH",
        /// A node was assigned to a block outside `0..k`.
        InvalidBlock => InvalidBlock { .. } => "PARTITION_INVALID_BLOCK",
    }
}

/// Error type produced when configuring or running a refiner.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RefinementError {
    /// A configuration parameter was out of range.
    #[error("invalid refinement parameter: {reason}")]
    InvalidParameters {
        /// Human-readable description of the violated constraint.
        reason: String,
    },
    /// The chosen gain cache cannot represent the objective on this input.
    #[error("the graph cut gain cache requires two-pin edges, but the largest edge has {max_edge_size} pins")]
    UnsupportedObjective {
        /// Size of the largest edge in the input.
        max_edge_size: usize,
    },
    /// The gain cache and the partition disagree on the number of blocks or nodes.
    #[error("gain cache sized for {cache_entries} entries cannot serve a partition needing {required}")]
    GainCacheMismatch {
        /// Entries allocated by the gain cache.
        cache_entries: usize,
        /// Entries required by the partition.
        required: usize,
    },
    /// A mutex guarding shared refinement state was poisoned by a panicking
    /// search.
    #[error("{resource} is poisoned")]
    LockPoisoned {
        /// The poisoned resource.
        resource: &'static str,
    },
    /// Building the input failed.
    #[error("invalid input: {error}")]
    Hypergraph {
        #[source]
        /// Underlying validation error.
        error: HypergraphError,
    },
}

define_error_codes! {
    /// Stable codes describing [`RefinementError`] variants.
    enum RefinementErrorCode for RefinementError {
        /// A configuration parameter was out of range.
        InvalidParameters => InvalidParameters { .. } => "REFINEMENT_INVALID_PARAMETERS",
        /// The chosen gain cache cannot represent the objective on this input.
        UnsupportedObjective => UnsupportedObjective { .. } => "REFINEMENT_UNSUPPORTED_OBJECTIVE",
        /// The gain cache and the partition disagree in size.
        GainCacheMismatch => GainCacheMismatch { .. } => "REFINEMENT_GAIN_CACHE_MISMATCH",
        /// A shared mutex was poisoned.
        LockPoisoned => LockPoisoned { .. } => "REFINEMENT_LOCK_POISONED",
        /// Building the input failed.
        HypergraphFailure => Hypergraph { .. } => "REFINEMENT_HYPERGRAPH_FAILURE",
    }
}

impl RefinementError {
    /// Retrieve the inner [`HypergraphErrorCode`] when the error originated while
    /// validating the input.
    pub const fn hypergraph_code(&self) -> Option<HypergraphErrorCode> {
        match self {
            Self::Hypergraph { error } => Some(error.code()),
            _ => None,
        }
    }
}

impl From<HypergraphError> for RefinementError {
    fn from(error: HypergraphError) -> Self {
        Self::Hypergraph { error }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, RefinementError>;
