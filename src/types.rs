//! General type definitions

/// Message tag used to tell the phases of an exchange apart.
pub type Tag = i32;

/// Tag of the first exchange phase (interface sizes).
pub const SIZE_EXCHANGE_TAG: Tag = 5098;

/// Tag of the second exchange phase (tree topology and mask).
pub const TOPOLOGY_EXCHANGE_TAG: Tag = 5099;

/// Tag of the third exchange phase (cell data).
pub const DATA_EXCHANGE_TAG: Tag = 5100;

/// Name of the cell array that marks ghost cells.
pub const GHOST_ARRAY_NAME: &str = "GhostType";

/// Value of the ghost array for cells owned by the local process.
pub const OWNED_CELL: u8 = 0;

/// Value of the ghost array for cells copied from a neighbouring process.
pub const GHOST_CELL: u8 = 1;

/// Generic error type
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Probing for a pending message failed.
    #[error("Probe failed for tag {tag}")]
    ProbeFailed {
        /// Tag that was probed.
        tag: Tag,
    },

    /// A probe returned a rank outside the communicator.
    #[error("Probe returned source rank {rank} outside of [0, {size})")]
    InvalidSource {
        /// Rank returned by the probe.
        rank: usize,
        /// Size of the communicator.
        size: usize,
    },

    /// A message arrived from a rank that was not expected to send one.
    #[error("Unexpected communication from rank {rank} with tag {tag}")]
    UnexpectedCommunication {
        /// Rank the message came from.
        rank: usize,
        /// Tag of the message.
        tag: Tag,
    },

    /// A message did not have the length the receiver expected.
    #[error(
        "Message from rank {rank} with tag {tag} has {actual} elements, expected {expected}"
    )]
    MessageLength {
        /// Rank the message came from.
        rank: usize,
        /// Tag of the message.
        tag: Tag,
        /// Number of elements the receiver expected.
        expected: usize,
        /// Number of elements in the message.
        actual: usize,
    },

    /// A received topology stream could not be replayed.
    #[error("Corrupt topology stream for tree {tree}: {reason}")]
    CorruptStream {
        /// Index of the tree being rebuilt.
        tree: usize,
        /// What went wrong.
        reason: String,
    },

    /// The message passing layer failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The grid does not have a supported shape.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
}

/// Result Type
pub type Result<T> = std::result::Result<T, Error>;
