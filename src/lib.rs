//! # rsmt2d
//!
//! A two-dimensional Reed–Solomon coded data-availability engine.
//!
//! `k²` original chunks are arranged as a `k × k` Original Data Square
//! (ODS), erasure-extended row-wise and column-wise into a `2k × 2k`
//! Extended Data Square (EDS), and committed to with a Merkle tree per row
//! and per column. Given a sparse, possibly adversarial subset of an EDS's
//! cells and the claimed row/column roots, [`ExtendedDataSquare::repair`]
//! runs an iterative two-dimensional erasure decoder (the "crossword
//! solver") that either fully reconstructs the square or returns evidence
//! of which axis disagrees with its claimed root.
//!
//! ## Example
//!
//! ```
//! use rsmt2d::codec::GaloisCodec;
//! use rsmt2d::tree::Sha256Tree;
//! use rsmt2d::ExtendedDataSquare;
//!
//! let chunk_size = 4;
//! let ods = vec![
//!     vec![1u8; chunk_size], vec![2u8; chunk_size],
//!     vec![3u8; chunk_size], vec![4u8; chunk_size],
//! ];
//!
//! let eds = ExtendedDataSquare::compute(
//!     ods,
//!     Box::new(GaloisCodec::new()),
//!     std::sync::Arc::new(Sha256Tree::new_ctor),
//! ).expect("compute should succeed");
//!
//! assert_eq!(eds.width(), 4);
//! assert_eq!(eds.get_cell(0, 0).unwrap(), Some(vec![1u8; chunk_size]));
//! ```

pub mod bitmatrix;
pub mod codec;
pub mod crossword;
pub mod data_square;
pub mod error;
pub mod extended_data_square;
pub mod tree;

pub use bitmatrix::BitMatrix;
pub use codec::Codec;
pub use data_square::DataSquare;
pub use error::{Error, Result};
pub use extended_data_square::ExtendedDataSquare;
pub use tree::{Tree, TreeConstructorFn};

/// Tags a row or column: the unit of both RS encoding and Merkle commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Col,
}

impl Axis {
    /// The axis orthogonal to this one.
    pub fn other(self) -> Axis {
        match self {
            Axis::Row => Axis::Col,
            Axis::Col => Axis::Row,
        }
    }
}
