//! `ExtendedDataSquare`: a `2k × 2k` [`DataSquare`] built from a `k × k`
//! Original Data Square (ODS) by erasure-extending every row and column,
//! plus the repair entry point that reconstructs one from a sparse subset
//! of its cells.

use std::fmt;

use crate::codec::Codec;
use crate::crossword;
use crate::data_square::{isqrt, DataSquare};
use crate::error::{Error, Result};
use crate::tree::TreeConstructorFn;

/// A `2k × 2k` grid split into four `k × k` quadrants: Q0 (original data),
/// Q1 (row parity of Q0), Q2 (column parity of Q0), and Q3 (parity of
/// parity — encoding Q2 row-wise, which by the systematic-code property
/// equals encoding Q1 column-wise).
pub struct ExtendedDataSquare {
    ds: DataSquare,
    codec: Box<dyn Codec>,
    tree_ctor: TreeConstructorFn,
    original_data_width: usize,
}

/// True iff `n` is a valid Original Data Square cell count, i.e. a perfect
/// square `k * k`.
pub fn is_ods_square(n: usize) -> bool {
    let k = isqrt(n);
    k * k == n
}

/// Converts an EDS width (`2k`) to its ODS width (`k`). Fails with
/// `InvalidDimensions` if `width` is not even and positive.
pub fn square_size_to_ods_square_size(width: usize) -> Result<usize> {
    if width == 0 || width % 2 != 0 {
        return Err(Error::InvalidDimensions(
            "extended data square width must be even and positive".into(),
        ));
    }
    Ok(width / 2)
}

impl ExtendedDataSquare {
    /// Builds a full EDS from a flattened `k × k` ODS by RS-extending every
    /// row then every column, then deriving Q3 from Q2.
    pub fn compute(ods: Vec<Vec<u8>>, codec: Box<dyn Codec>, tree_ctor: TreeConstructorFn) -> Result<Self> {
        if ods.is_empty() {
            return Err(Error::InvalidDimensions(
                "original data square must have at least one cell".into(),
            ));
        }
        if !is_ods_square(ods.len()) {
            return Err(Error::InvalidDimensions(format!(
                "{} cells is not a perfect square",
                ods.len()
            )));
        }
        let k = isqrt(ods.len());
        if ods.len() > codec.max_chunks() {
            return Err(Error::TooManyChunks);
        }

        let chunk_size = ods[0].len();
        codec.validate_chunk_size(chunk_size)?;
        for chunk in &ods {
            if chunk.len() != chunk_size {
                return Err(Error::InvalidChunkSize {
                    expected: chunk_size,
                    actual: chunk.len(),
                });
            }
        }

        let width = 2 * k;
        let mut flat: Vec<Vec<u8>> = vec![Vec::new(); width * width];

        // Q0 + Q1: row-wise extension of every original row.
        for r in 0..k {
            let row = &ods[r * k..r * k + k];
            let coded = codec.encode(row)?;
            for (c, chunk) in coded.into_iter().enumerate() {
                flat[r * width + c] = chunk;
            }
        }

        // Q2: column-wise extension of every original column.
        for c in 0..k {
            let col: Vec<Vec<u8>> = (0..k).map(|r| ods[r * k + c].clone()).collect();
            let coded = codec.encode(&col)?;
            for (r, chunk) in coded.into_iter().enumerate().skip(k) {
                flat[r * width + c] = chunk;
            }
        }

        // Q3: row-wise extension of Q2, which completes every parity row.
        for r in 0..k {
            let q2_row: Vec<Vec<u8>> = (0..k).map(|c| flat[(k + r) * width + c].clone()).collect();
            let coded = codec.encode(&q2_row)?;
            for (c, chunk) in coded.into_iter().enumerate().skip(k) {
                flat[(k + r) * width + c] = chunk;
            }
        }

        let cells = flat.into_iter().map(Some).collect();
        let ds = DataSquare::new(cells, tree_ctor.clone(), chunk_size)?;

        Ok(Self {
            ds,
            codec,
            tree_ctor,
            original_data_width: k,
        })
    }

    /// Accepts a flattened, possibly sparse EDS. `flat.len()` must be an
    /// even-width perfect square no larger than `4 * codec.max_chunks()`.
    pub fn import(
        flat: Vec<Option<Vec<u8>>>,
        codec: Box<dyn Codec>,
        tree_ctor: TreeConstructorFn,
    ) -> Result<Self> {
        if flat.len() > 4 * codec.max_chunks() {
            return Err(Error::TooManyChunks);
        }
        if !is_ods_square(flat.len()) {
            return Err(Error::InvalidDimensions(format!(
                "{} cells is not a perfect square",
                flat.len()
            )));
        }
        let width = isqrt(flat.len());
        let original_data_width = square_size_to_ods_square_size(width)?;

        let chunk_size = flat
            .iter()
            .find_map(|cell| cell.as_ref().map(Vec::len))
            .unwrap_or(0);
        codec.validate_chunk_size(chunk_size)?;
        let ds = DataSquare::new(flat, tree_ctor.clone(), chunk_size)?;

        Ok(Self {
            ds,
            codec,
            tree_ctor,
            original_data_width,
        })
    }

    /// A fresh `width × width` EDS with every cell unset.
    pub fn new_empty(
        codec: Box<dyn Codec>,
        tree_ctor: TreeConstructorFn,
        width: usize,
        chunk_size: usize,
    ) -> Result<Self> {
        let original_data_width = square_size_to_ods_square_size(width)?;
        let flat = vec![None; width * width];
        let ds = DataSquare::new(flat, tree_ctor.clone(), chunk_size)?;
        Ok(Self {
            ds,
            codec,
            tree_ctor,
            original_data_width,
        })
    }

    pub fn width(&self) -> usize {
        self.ds.width()
    }

    pub fn original_data_width(&self) -> usize {
        self.original_data_width
    }

    /// Writes `chunk` into `(r, c)`; fails if the cell already holds a
    /// value (see [`DataSquare::set_cell`]).
    pub fn set_cell(&mut self, r: usize, c: usize, chunk: Vec<u8>) -> Result<()> {
        self.ds.set_cell(r, c, chunk)
    }

    /// The cell at `(r, c)`, or `None` if it has not been set yet.
    pub fn get_cell(&self, r: usize, c: usize) -> Result<Option<Vec<u8>>> {
        self.ds.get(r, c)
    }

    pub fn row(&self, r: usize) -> Result<Vec<Option<Vec<u8>>>> {
        self.ds.row(r)
    }

    pub fn col(&self, c: usize) -> Result<Vec<Option<Vec<u8>>>> {
        self.ds.col(c)
    }

    /// The cells of row `r` at columns `[lo, hi)`.
    pub fn row_range(&self, r: usize, lo: usize, hi: usize) -> Result<Vec<Option<Vec<u8>>>> {
        self.ds.row_slice(r, lo, hi - lo)
    }

    /// The cells of column `c` at rows `[lo, hi)`.
    pub fn col_range(&self, c: usize, lo: usize, hi: usize) -> Result<Vec<Option<Vec<u8>>>> {
        self.ds.col_slice(c, lo, hi - lo)
    }

    pub fn flattened(&self) -> Vec<Option<Vec<u8>>> {
        self.ds.flattened()
    }

    pub fn row_roots(&mut self) -> Result<Vec<Vec<u8>>> {
        self.ds.row_roots()
    }

    pub fn col_roots(&mut self) -> Result<Vec<Vec<u8>>> {
        self.ds.col_roots()
    }

    /// True iff every cell, row root, and column root of `self` and `other`
    /// are equal.
    pub fn equals(&self, other: &ExtendedDataSquare) -> bool {
        self.ds.equals(&other.ds)
    }

    /// Reconstructs the square from its currently present cells against
    /// `row_roots`/`col_roots`. See the [`crossword`] module for the
    /// algorithm.
    pub fn repair(&mut self, row_roots: &[Vec<u8>], col_roots: &[Vec<u8>]) -> Result<()> {
        let width = self.width();
        if row_roots.len() != width || col_roots.len() != width {
            return Err(Error::InvalidDimensions(format!(
                "expected {width} row/col roots, got {}/{}",
                row_roots.len(),
                col_roots.len()
            )));
        }
        crossword::repair(
            &mut self.ds,
            self.codec.as_ref(),
            &self.tree_ctor,
            self.original_data_width,
            row_roots,
            col_roots,
        )
    }
}

impl fmt::Debug for ExtendedDataSquare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedDataSquare")
            .field("width", &self.width())
            .field("original_data_width", &self.original_data_width)
            .field("codec", &self.codec.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GaloisCodec;
    use crate::tree::Sha256Tree;
    use std::sync::Arc;

    fn ctor() -> TreeConstructorFn {
        Arc::new(Sha256Tree::new_ctor)
    }

    #[test]
    fn compute_preserves_original_quadrant() {
        let ods = vec![vec![1u8; 4], vec![2u8; 4], vec![3u8; 4], vec![4u8; 4]];
        let eds = ExtendedDataSquare::compute(ods.clone(), Box::new(GaloisCodec::new()), ctor()).unwrap();

        assert_eq!(eds.width(), 4);
        assert_eq!(eds.original_data_width(), 2);
        assert_eq!(eds.get_cell(0, 0).unwrap(), Some(ods[0].clone()));
        assert_eq!(eds.get_cell(0, 1).unwrap(), Some(ods[1].clone()));
        assert_eq!(eds.get_cell(1, 0).unwrap(), Some(ods[2].clone()));
        assert_eq!(eds.get_cell(1, 1).unwrap(), Some(ods[3].clone()));
    }

    #[test]
    fn compute_produces_valid_codewords_on_every_axis() {
        let ods = vec![vec![1u8; 4], vec![2u8; 4], vec![3u8; 4], vec![4u8; 4]];
        let codec = GaloisCodec::new();
        let mut eds = ExtendedDataSquare::compute(ods, Box::new(GaloisCodec::new()), ctor()).unwrap();

        for r in 0..eds.width() {
            let row: Vec<Vec<u8>> = eds.row(r).unwrap().into_iter().map(Option::unwrap).collect();
            let recoded = codec.encode(&row[..2]).unwrap();
            assert_eq!(recoded, row);
        }
        for c in 0..eds.width() {
            let col: Vec<Vec<u8>> = eds.col(c).unwrap().into_iter().map(Option::unwrap).collect();
            let recoded = codec.encode(&col[..2]).unwrap();
            assert_eq!(recoded, col);
        }
        let _ = eds.row_roots().unwrap();
        let _ = eds.col_roots().unwrap();
    }

    #[test]
    fn import_rejects_odd_width() {
        let flat: Vec<Option<Vec<u8>>> = vec![Some(vec![1, 2]); 9]; // width 3
        let result = ExtendedDataSquare::import(flat, Box::new(GaloisCodec::new()), ctor());
        assert!(result.is_err());
    }

    #[test]
    fn import_accepts_sparse_square() {
        let flat: Vec<Option<Vec<u8>>> = vec![Some(vec![1, 2]), None, None, Some(vec![3, 4])];
        let eds = ExtendedDataSquare::import(flat, Box::new(GaloisCodec::new()), ctor()).unwrap();
        assert_eq!(eds.width(), 2);
        assert_eq!(eds.original_data_width(), 1);
        assert_eq!(eds.get_cell(0, 1).unwrap(), None);
    }

    #[test]
    fn new_empty_has_no_cells_set() {
        let eds = ExtendedDataSquare::new_empty(Box::new(GaloisCodec::new()), ctor(), 4, 8).unwrap();
        assert_eq!(eds.get_cell(3, 3).unwrap(), None);
    }

    #[test]
    fn set_cell_delegates_single_assignment_rule() {
        let mut eds = ExtendedDataSquare::new_empty(Box::new(GaloisCodec::new()), ctor(), 2, 2).unwrap();
        eds.set_cell(0, 0, vec![1, 2]).unwrap();
        assert!(eds.set_cell(0, 0, vec![3, 4]).is_err());
    }

    #[test]
    fn is_ods_square_checks_perfect_squares() {
        assert!(is_ods_square(0));
        assert!(is_ods_square(1));
        assert!(is_ods_square(4));
        assert!(is_ods_square(9));
        assert!(!is_ods_square(2));
        assert!(!is_ods_square(10));
    }

    #[test]
    fn square_size_to_ods_square_size_requires_even_positive_width() {
        assert_eq!(square_size_to_ods_square_size(4).unwrap(), 2);
        assert!(square_size_to_ods_square_size(0).is_err());
        assert!(square_size_to_ods_square_size(3).is_err());
    }

    #[test]
    fn import_rejects_codec_incompatible_chunk_size() {
        use crate::codec::LeopardCodec;

        // LeopardCodec (GF(2^16)) requires an even chunk size.
        let flat: Vec<Option<Vec<u8>>> = vec![Some(vec![1, 2, 3]), None, None, Some(vec![4, 5, 6])];
        let result = ExtendedDataSquare::import(flat, Box::new(LeopardCodec::new()), ctor());
        assert!(result.is_err());
    }
}
