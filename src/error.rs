//! Error taxonomy shared by every layer of the crate.

use crate::Axis;

/// Errors produced by [`DataSquare`](crate::DataSquare) and
/// [`ExtendedDataSquare`](crate::ExtendedDataSquare) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A flattened chunk vector is not a perfect square, or an extended
    /// square's width is not even.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// A chunk's length does not match the square's `chunk_size`.
    #[error("invalid chunk size: expected {expected}, got {actual}")]
    InvalidChunkSize { expected: usize, actual: usize },

    /// A cell, row, or column index is outside `[0, width)`.
    #[error("index {index} out of range for width {width}")]
    OutOfRange { index: usize, width: usize },

    /// `set_cell` was called on a cell that already holds a value.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The original data square has more cells than the codec supports.
    #[error("number of chunks exceeds codec maximum")]
    TooManyChunks,

    /// A codec backend failed for a reason other than "not enough shares".
    #[error("codec error")]
    Codec(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A tree backend failed to accept a push or compute a root.
    #[error("tree error")]
    Tree(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The crossword solver stalled with no further progress possible.
    #[error("unrepairable data square")]
    Unrepairable,

    /// A reconstructed or pre-existing axis disagrees with its expected
    /// root (or, for an original-quadrant row/column, with its own parity).
    /// `shares` is the pre-decode view of the offending axis: present cells
    /// as supplied, missing cells `None`, suitable for building a fraud
    /// proof against the claimed root.
    #[error("byzantine data at {axis:?} {index}")]
    ByzantineData {
        axis: Axis,
        index: usize,
        shares: Vec<Option<Vec<u8>>>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn codec(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Codec(Box::new(err))
    }

    pub(crate) fn tree(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Tree(Box::new(err))
    }
}
