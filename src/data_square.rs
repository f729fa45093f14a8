//! `DataSquare`: a `w × w` grid of equal-size byte chunks with dual
//! row-major/column-major storage, lazy per-axis root caching, and safe
//! single-assignment cell mutation.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::tree::TreeConstructorFn;
use crate::Axis;

type Cell = Option<Vec<u8>>;

/// Stores every chunk of an original or extended data square, in both
/// row-major and column-major order so row and column slices are always a
/// cheap clone away, never a transpose.
pub struct DataSquare {
    by_row: Vec<Vec<Cell>>,
    by_col: Vec<Vec<Cell>>,
    width: usize,
    chunk_size: usize,
    row_roots: Vec<Cell>,
    col_roots: Vec<Cell>,
    tree_ctor: TreeConstructorFn,
}

impl DataSquare {
    /// Builds a square from a flattened, row-major list of cells. `flat`'s
    /// length must be a perfect square; every present cell must have
    /// length `chunk_size`.
    pub fn new(flat: Vec<Cell>, tree_ctor: TreeConstructorFn, chunk_size: usize) -> Result<Self> {
        let width = isqrt(flat.len());
        if width * width != flat.len() {
            return Err(Error::InvalidDimensions(format!(
                "{} cells is not a perfect square",
                flat.len()
            )));
        }
        for cell in &flat {
            if let Some(chunk) = cell {
                if chunk.len() != chunk_size {
                    return Err(Error::InvalidChunkSize {
                        expected: chunk_size,
                        actual: chunk.len(),
                    });
                }
            }
        }

        let mut by_row: Vec<Vec<Cell>> = Vec::with_capacity(width);
        for chunk in flat.chunks(width) {
            by_row.push(chunk.to_vec());
        }
        let by_col = transpose(&by_row, width);

        Ok(Self {
            by_row,
            by_col,
            width,
            chunk_size,
            row_roots: vec![None; width],
            col_roots: vec![None; width],
            tree_ctor,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn check_bounds(&self, r: usize, c: usize) -> Result<()> {
        if r >= self.width {
            return Err(Error::OutOfRange {
                index: r,
                width: self.width,
            });
        }
        if c >= self.width {
            return Err(Error::OutOfRange {
                index: c,
                width: self.width,
            });
        }
        Ok(())
    }

    /// Returns a defensive copy of the cell at `(r, c)`.
    pub fn get(&self, r: usize, c: usize) -> Result<Cell> {
        self.check_bounds(r, c)?;
        Ok(self.by_row[r][c].clone())
    }

    /// Writes `chunk` into `(r, c)`, but only if the cell is currently
    /// empty. Invalidates the row and column root caches on success.
    pub fn set_cell(&mut self, r: usize, c: usize, chunk: Vec<u8>) -> Result<()> {
        self.check_bounds(r, c)?;
        if self.by_row[r][c].is_some() {
            return Err(Error::InvalidOperation(format!(
                "cell ({r}, {c}) is already set"
            )));
        }
        if chunk.len() != self.chunk_size {
            return Err(Error::InvalidChunkSize {
                expected: self.chunk_size,
                actual: chunk.len(),
            });
        }

        self.by_row[r][c] = Some(chunk.clone());
        self.by_col[c][r] = Some(chunk);
        self.row_roots[r] = None;
        self.col_roots[c] = None;
        Ok(())
    }

    /// Overwrites `(r, c)` unconditionally, invalidating root caches. Only
    /// the crossword solver ([`crate::crossword`]) may call this; every
    /// other writer must go through [`DataSquare::set_cell`].
    pub(crate) fn set_cell_unchecked(&mut self, r: usize, c: usize, chunk: Vec<u8>) -> Result<()> {
        self.check_bounds(r, c)?;
        if chunk.len() != self.chunk_size {
            return Err(Error::InvalidChunkSize {
                expected: self.chunk_size,
                actual: chunk.len(),
            });
        }
        self.by_row[r][c] = Some(chunk.clone());
        self.by_col[c][r] = Some(chunk);
        self.row_roots[r] = None;
        self.col_roots[c] = None;
        Ok(())
    }

    /// A defensive copy of row `r`.
    pub fn row(&self, r: usize) -> Result<Vec<Cell>> {
        if r >= self.width {
            return Err(Error::OutOfRange {
                index: r,
                width: self.width,
            });
        }
        Ok(self.by_row[r].clone())
    }

    /// A defensive copy of column `c`.
    pub fn col(&self, c: usize) -> Result<Vec<Cell>> {
        if c >= self.width {
            return Err(Error::OutOfRange {
                index: c,
                width: self.width,
            });
        }
        Ok(self.by_col[c].clone())
    }

    /// A defensive copy of `byRow[r][y..y+len]`.
    pub fn row_slice(&self, r: usize, y: usize, len: usize) -> Result<Vec<Cell>> {
        self.check_range(r, y, len)?;
        Ok(self.by_row[r][y..y + len].to_vec())
    }

    /// A defensive copy of `byCol[c][x..x+len]`.
    pub fn col_slice(&self, c: usize, x: usize, len: usize) -> Result<Vec<Cell>> {
        self.check_range(c, x, len)?;
        Ok(self.by_col[c][x..x + len].to_vec())
    }

    fn check_range(&self, axis_index: usize, start: usize, len: usize) -> Result<()> {
        if axis_index >= self.width {
            return Err(Error::OutOfRange {
                index: axis_index,
                width: self.width,
            });
        }
        if start + len > self.width {
            return Err(Error::OutOfRange {
                index: start + len,
                width: self.width,
            });
        }
        Ok(())
    }

    /// Overwrites `byRow[r][y..y+values.len()]` (and the mirrored column
    /// cells), used internally by [`crate::ExtendedDataSquare::compute`]
    /// to write a freshly encoded quadrant in one pass.
    pub(crate) fn set_row_slice(&mut self, r: usize, y: usize, values: &[Vec<u8>]) -> Result<()> {
        self.check_range(r, y, values.len())?;
        for chunk in values {
            if chunk.len() != self.chunk_size {
                return Err(Error::InvalidChunkSize {
                    expected: self.chunk_size,
                    actual: chunk.len(),
                });
            }
        }
        for (i, chunk) in values.iter().enumerate() {
            let c = y + i;
            self.by_row[r][c] = Some(chunk.clone());
            self.by_col[c][r] = Some(chunk.clone());
            self.col_roots[c] = None;
        }
        self.row_roots[r] = None;
        Ok(())
    }

    /// Column counterpart of [`DataSquare::set_row_slice`].
    pub(crate) fn set_col_slice(&mut self, c: usize, x: usize, values: &[Vec<u8>]) -> Result<()> {
        self.check_range(c, x, values.len())?;
        for chunk in values {
            if chunk.len() != self.chunk_size {
                return Err(Error::InvalidChunkSize {
                    expected: self.chunk_size,
                    actual: chunk.len(),
                });
            }
        }
        for (i, chunk) in values.iter().enumerate() {
            let r = x + i;
            self.by_col[c][r] = Some(chunk.clone());
            self.by_row[r][c] = Some(chunk.clone());
            self.row_roots[r] = None;
        }
        self.col_roots[c] = None;
        Ok(())
    }

    /// Grows the square from `width` to `width + delta` by appending
    /// `delta` filler columns, then `delta` filler rows. Resets the entire
    /// root cache (the shape itself changed).
    pub fn extend_square(&mut self, delta: usize, filler: &[u8]) -> Result<()> {
        if filler.len() != self.chunk_size {
            return Err(Error::InvalidChunkSize {
                expected: self.chunk_size,
                actual: filler.len(),
            });
        }

        let new_width = self.width + delta;
        for row in self.by_row.iter_mut() {
            row.extend(std::iter::repeat_with(|| Some(filler.to_vec())).take(delta));
        }
        for _ in 0..delta {
            self.by_row
                .push(std::iter::repeat_with(|| Some(filler.to_vec())).take(new_width).collect());
        }

        self.by_col = transpose(&self.by_row, new_width);
        self.width = new_width;
        self.row_roots = vec![None; new_width];
        self.col_roots = vec![None; new_width];
        Ok(())
    }

    /// The Merkle root of row `r`, computing and caching it if necessary.
    /// Fails with [`Error::InvalidOperation`] if the row has a missing
    /// cell — only a fully populated axis has a well-defined root.
    pub fn row_root(&mut self, r: usize) -> Result<Vec<u8>> {
        if r >= self.width {
            return Err(Error::OutOfRange {
                index: r,
                width: self.width,
            });
        }
        if let Some(root) = &self.row_roots[r] {
            return Ok(root.clone());
        }
        let root = compute_axis_root(&self.by_row[r], Axis::Row, r as u32, &self.tree_ctor)?;
        self.row_roots[r] = Some(root.clone());
        Ok(root)
    }

    /// The Merkle root of column `c`; see [`DataSquare::row_root`].
    pub fn col_root(&mut self, c: usize) -> Result<Vec<u8>> {
        if c >= self.width {
            return Err(Error::OutOfRange {
                index: c,
                width: self.width,
            });
        }
        if let Some(root) = &self.col_roots[c] {
            return Ok(root.clone());
        }
        let root = compute_axis_root(&self.by_col[c], Axis::Col, c as u32, &self.tree_ctor)?;
        self.col_roots[c] = Some(root.clone());
        Ok(root)
    }

    /// All row roots, computing the uncached ones in parallel.
    pub fn row_roots(&mut self) -> Result<Vec<Vec<u8>>> {
        self.compute_missing_roots(Axis::Row)?;
        self.row_roots
            .iter()
            .map(|r| {
                r.clone()
                    .ok_or_else(|| Error::InvalidOperation("row root missing after compute".into()))
            })
            .collect()
    }

    /// All column roots, computing the uncached ones in parallel.
    pub fn col_roots(&mut self) -> Result<Vec<Vec<u8>>> {
        self.compute_missing_roots(Axis::Col)?;
        self.col_roots
            .iter()
            .map(|r| {
                r.clone()
                    .ok_or_else(|| Error::InvalidOperation("col root missing after compute".into()))
            })
            .collect()
    }

    fn compute_missing_roots(&mut self, axis: Axis) -> Result<()> {
        let cached = match axis {
            Axis::Row => &self.row_roots,
            Axis::Col => &self.col_roots,
        };
        let missing: Vec<usize> = (0..self.width).filter(|&i| cached[i].is_none()).collect();
        if missing.is_empty() {
            return Ok(());
        }

        let lanes: &Vec<Vec<Cell>> = match axis {
            Axis::Row => &self.by_row,
            Axis::Col => &self.by_col,
        };
        let tree_ctor = &self.tree_ctor;
        let results: Vec<Result<(usize, Vec<u8>)>> = missing
            .par_iter()
            .map(|&i| {
                compute_axis_root(&lanes[i], axis, i as u32, tree_ctor).map(|root| (i, root))
            })
            .collect();

        let cache = match axis {
            Axis::Row => &mut self.row_roots,
            Axis::Col => &mut self.col_roots,
        };
        for result in results {
            let (i, root) = result?;
            cache[i] = Some(root);
        }
        Ok(())
    }

    /// The flattened, row-major cell list.
    pub fn flattened(&self) -> Vec<Cell> {
        self.by_row.iter().flatten().cloned().collect()
    }

    /// True iff every cell of both squares is equal. `DataSquare`
    /// deliberately does not derive `PartialEq` — chunks can be large, so
    /// the cost of a full comparison should be explicit at the call site.
    pub fn equals(&self, other: &DataSquare) -> bool {
        self.width == other.width && self.chunk_size == other.chunk_size && self.by_row == other.by_row
    }
}

fn compute_axis_root(
    cells: &[Cell],
    axis: Axis,
    index: u32,
    tree_ctor: &TreeConstructorFn,
) -> Result<Vec<u8>> {
    let mut tree = tree_ctor(axis, index);
    for cell in cells {
        match cell {
            Some(chunk) => tree.push(chunk).map_err(Error::tree)?,
            None => {
                return Err(Error::InvalidOperation(format!(
                    "cannot compute root of incomplete {axis:?} {index}"
                )))
            }
        }
    }
    tree.root()
}

fn transpose(by_row: &[Vec<Cell>], width: usize) -> Vec<Vec<Cell>> {
    let mut by_col = vec![vec![None; width]; width];
    for (r, row) in by_row.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            by_col[c][r] = cell.clone();
        }
    }
    by_col
}

pub(crate) fn isqrt(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut x = (n as f64).sqrt().round() as usize;
    while x * x > n {
        x -= 1;
    }
    while (x + 1) * (x + 1) <= n {
        x += 1;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Sha256Tree;
    use std::sync::Arc;

    fn ctor() -> TreeConstructorFn {
        Arc::new(Sha256Tree::new_ctor)
    }

    fn flat(cells: &[&[u8]]) -> Vec<Cell> {
        cells.iter().map(|c| Some(c.to_vec())).collect()
    }

    #[test]
    fn construction_rejects_non_square_lengths() {
        let cells: Vec<Cell> = vec![Some(vec![1, 2]), Some(vec![3, 4]), Some(vec![5, 6])];
        assert!(DataSquare::new(cells, ctor(), 2).is_err());
    }

    #[test]
    fn construction_rejects_uneven_chunk_sizes() {
        let cells: Vec<Cell> = vec![Some(vec![1, 2]), Some(vec![3]), Some(vec![5, 6]), Some(vec![7, 8])];
        assert!(DataSquare::new(cells, ctor(), 2).is_err());
    }

    #[test]
    fn get_and_set_cell() {
        let cells = flat(&[&[1, 2], &[3, 4], &[5, 6], &[7, 8]]);
        let mut ds = DataSquare::new(cells, ctor(), 2).unwrap();

        assert_eq!(ds.get(0, 0).unwrap(), Some(vec![1, 2]));
        assert_eq!(ds.get(1, 1).unwrap(), Some(vec![7, 8]));
        assert!(ds.get(2, 0).is_err());
    }

    #[test]
    fn set_cell_is_single_assignment() {
        let cells = flat(&[&[1, 2], &[3, 4], &[5, 6], &[7, 8]]);
        let mut ds = DataSquare::new(cells, ctor(), 2).unwrap();
        assert!(ds.set_cell(0, 0, vec![9, 9]).is_err()); // already set
    }

    #[test]
    fn set_cell_into_empty_square_then_reject_second_write() {
        let cells: Vec<Cell> = vec![None; 4];
        let mut ds = DataSquare::new(cells, ctor(), 2).unwrap();
        ds.set_cell(0, 0, vec![1, 2]).unwrap();
        assert_eq!(ds.get(0, 0).unwrap(), Some(vec![1, 2]));
        assert!(ds.set_cell(0, 0, vec![3, 4]).is_err());
    }

    #[test]
    fn get_returns_defensive_copy() {
        let cells = flat(&[&[1, 2], &[3, 4], &[5, 6], &[7, 8]]);
        let ds = DataSquare::new(cells, ctor(), 2).unwrap();
        let mut copy = ds.get(0, 0).unwrap().unwrap();
        copy[0] = 0xff;
        assert_eq!(ds.get(0, 0).unwrap(), Some(vec![1, 2]));
    }

    #[test]
    fn row_and_col_mirrors_agree() {
        let cells = flat(&[&[1], &[2], &[3], &[4], &[5], &[6], &[7], &[8], &[9]]);
        let ds = DataSquare::new(cells, ctor(), 1).unwrap();
        for r in 0..3 {
            for c in 0..3 {
                assert_eq!(ds.row(r).unwrap()[c], ds.col(c).unwrap()[r]);
            }
        }
    }

    #[test]
    fn write_invalidates_only_affected_root_caches() {
        let cells: Vec<Cell> = vec![None; 4];
        let mut ds = DataSquare::new(cells, ctor(), 2).unwrap();
        ds.set_cell(0, 0, vec![1, 2]).unwrap();
        ds.set_cell(0, 1, vec![3, 4]).unwrap();
        ds.set_cell(1, 0, vec![5, 6]).unwrap();
        ds.set_cell(1, 1, vec![7, 8]).unwrap();

        let root_before = ds.row_root(0).unwrap();
        assert!(ds.row_roots[0].is_some());
        assert!(ds.row_roots[1].is_none());

        // overwriting via the internal path still invalidates just row 0 / col 0.
        ds.set_cell_unchecked(0, 0, vec![9, 9]).unwrap();
        assert!(ds.row_roots[0].is_none());
        assert!(ds.col_roots[0].is_none());
        let root_after = ds.row_root(0).unwrap();
        assert_ne!(root_before, root_after);
    }

    #[test]
    fn row_root_requires_full_axis() {
        let cells: Vec<Cell> = vec![Some(vec![1, 2]), None, Some(vec![5, 6]), Some(vec![7, 8])];
        let mut ds = DataSquare::new(cells, ctor(), 2).unwrap();
        assert!(ds.row_root(0).is_err());
    }

    #[test]
    fn extend_square_appends_filler() {
        let cells = flat(&[&[1, 2]]); // 1x1
        let mut ds = DataSquare::new(cells, ctor(), 2).unwrap();
        ds.extend_square(1, &[9, 9]).unwrap();
        assert_eq!(ds.width(), 2);
        assert_eq!(ds.get(0, 0).unwrap(), Some(vec![1, 2]));
        assert_eq!(ds.get(0, 1).unwrap(), Some(vec![9, 9]));
        assert_eq!(ds.get(1, 0).unwrap(), Some(vec![9, 9]));
        assert_eq!(ds.get(1, 1).unwrap(), Some(vec![9, 9]));
    }

    #[test]
    fn equals_compares_structurally() {
        let a = DataSquare::new(flat(&[&[1, 2], &[3, 4], &[5, 6], &[7, 8]]), ctor(), 2).unwrap();
        let b = DataSquare::new(flat(&[&[1, 2], &[3, 4], &[5, 6], &[7, 8]]), ctor(), 2).unwrap();
        let c = DataSquare::new(flat(&[&[1, 2], &[3, 4], &[5, 6], &[9, 9]]), ctor(), 2).unwrap();
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
    }
}
