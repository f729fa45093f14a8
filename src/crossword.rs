//! The crossword solver: reconstructs an [`ExtendedDataSquare`](crate::ExtendedDataSquare)
//! from a sparse, possibly adversarial subset of its cells.
//!
//! The solver alternates row and column erasure decoding until the square is
//! fully populated (success), no axis can make further progress
//! ([`Error::Unrepairable`]), or a reconstructed axis disagrees with its
//! claimed root ([`Error::ByzantineData`]).

use rayon::prelude::*;

use crate::bitmatrix::BitMatrix;
use crate::codec::Codec;
use crate::data_square::DataSquare;
use crate::error::{Error, Result};
use crate::tree::TreeConstructorFn;
use crate::Axis;

/// Maps a position `j` along `axis` at axis-index `i` to `(row, col)`.
fn cell_coords(axis: Axis, i: usize, j: usize) -> (usize, usize) {
    match axis {
        Axis::Row => (i, j),
        Axis::Col => (j, i),
    }
}

fn axis_cells(ds: &DataSquare, axis: Axis, i: usize) -> Result<Vec<Option<Vec<u8>>>> {
    match axis {
        Axis::Row => ds.row(i),
        Axis::Col => ds.col(i),
    }
}

fn fresh_axis_root(
    cells: &[Vec<u8>],
    axis: Axis,
    index: usize,
    tree_ctor: &TreeConstructorFn,
) -> Result<Vec<u8>> {
    let mut tree = tree_ctor(axis, index as u32);
    for cell in cells {
        tree.push(cell).map_err(Error::tree)?;
    }
    tree.root()
}

/// Runs the pre-repair sanity check across every row and column, in
/// parallel, first error wins. A fully populated axis whose root and
/// parity both check out passes silently; a partially populated axis is
/// skipped (it has nothing to verify yet).
fn sanity_check(
    ds: &DataSquare,
    codec: &dyn Codec,
    tree_ctor: &TreeConstructorFn,
    original_data_width: usize,
    row_roots: &[Vec<u8>],
    col_roots: &[Vec<u8>],
) -> Result<()> {
    let width = ds.width();

    let check = |axis: Axis, i: usize, expected: &[u8]| -> Result<()> {
        let cells = axis_cells(ds, axis, i)?;
        if cells.iter().any(Option::is_none) {
            return Ok(());
        }
        let full: Vec<Vec<u8>> = cells.into_iter().flatten().collect();

        let byzantine = || Error::ByzantineData {
            axis,
            index: i,
            shares: full.iter().cloned().map(Some).collect(),
        };

        match fresh_axis_root(&full, axis, i, tree_ctor) {
            Ok(root) if root == expected => {}
            _ => {
                tracing::warn!(axis = ?axis, index = i, "sanity check: axis root mismatch");
                return Err(byzantine());
            }
        }

        let recoded = codec.encode(&full[..original_data_width]).map_err(|_| {
            tracing::warn!(axis = ?axis, index = i, "sanity check: axis parity does not re-encode");
            byzantine()
        })?;
        if recoded != full {
            tracing::warn!(axis = ?axis, index = i, "sanity check: axis fails parity re-encode");
            return Err(byzantine());
        }
        Ok(())
    };

    let row_results: Vec<Result<()>> = (0..width)
        .into_par_iter()
        .map(|i| check(Axis::Row, i, &row_roots[i]))
        .collect();
    let col_results: Vec<Result<()>> = (0..width)
        .into_par_iter()
        .map(|i| check(Axis::Col, i, &col_roots[i]))
        .collect();

    for result in row_results.into_iter().chain(col_results) {
        result?;
    }
    Ok(())
}

/// Attempts to fully decode axis `i` of `axis`. Returns `(solved, progress)`:
/// `solved` is true if the axis ends this call with no missing cells,
/// `progress` is true if this call filled in at least one previously-`nil`
/// cell.
#[allow(clippy::too_many_arguments)]
fn solve_axis(
    ds: &mut DataSquare,
    codec: &dyn Codec,
    tree_ctor: &TreeConstructorFn,
    present: &mut BitMatrix,
    axis: Axis,
    i: usize,
    row_roots: &[Vec<u8>],
    col_roots: &[Vec<u8>],
) -> Result<(bool, bool)> {
    let width = ds.width();
    let shares = axis_cells(ds, axis, i)?;
    if shares.iter().all(Option::is_some) {
        return Ok((true, false));
    }

    let present_count = shares.iter().filter(|c| c.is_some()).count();
    let rebuilt = match codec.decode(&shares) {
        Ok(rebuilt) => rebuilt,
        // Fewer shares than the codec's data-share count can ever decode to;
        // that is simply "not enough information yet", not a backend fault.
        Err(_) if present_count < width / 2 => return Ok((false, false)),
        Err(err) => return Err(err),
    };

    let axis_roots = match axis {
        Axis::Row => row_roots,
        Axis::Col => col_roots,
    };
    let root = fresh_axis_root(&rebuilt, axis, i, tree_ctor);
    match root {
        Ok(root) if root == axis_roots[i] => {}
        _ => {
            tracing::warn!(axis = ?axis, index = i, "crossword: reconstructed axis disagrees with claimed root");
            return Err(Error::ByzantineData {
                axis,
                index: i,
                shares,
            });
        }
    }

    // Step 5: an orthogonal axis completed purely by this fill must also be
    // checked before any cell is actually written.
    let orth_axis = axis.other();
    let orth_roots = match orth_axis {
        Axis::Row => row_roots,
        Axis::Col => col_roots,
    };
    for j in 0..width {
        let (r, c) = cell_coords(axis, i, j);
        if present.get(r, c) {
            continue;
        }
        let other_present = match orth_axis {
            Axis::Row => present.num_ones_in_row(j) == width - 1,
            Axis::Col => present.num_ones_in_col(j) == width - 1,
        };
        if !other_present {
            continue;
        }

        let mut orth_cells = axis_cells(ds, orth_axis, j)?;
        let local_pos = match orth_axis {
            Axis::Row => c,
            Axis::Col => r,
        };
        orth_cells[local_pos] = Some(rebuilt[j].clone());

        if orth_cells.iter().any(Option::is_none) {
            continue; // still incomplete even with this fill; nothing to verify yet
        }
        let full: Vec<Vec<u8>> = orth_cells.iter().cloned().flatten().collect();
        let root = fresh_axis_root(&full, orth_axis, j, tree_ctor);
        match root {
            Ok(root) if root == orth_roots[j] => {}
            _ => {
                tracing::warn!(
                    axis = ?orth_axis, index = j,
                    "crossword: orthogonal axis completed by this fill disagrees with claimed root"
                );
                // pre-decode view: position (r, c) is still unknown locally.
                let mut evidence = orth_cells;
                evidence[local_pos] = None;
                return Err(Error::ByzantineData {
                    axis: orth_axis,
                    index: j,
                    shares: evidence,
                });
            }
        }
    }

    // All checks passed: commit every still-missing cell of this axis.
    for j in 0..width {
        let (r, c) = cell_coords(axis, i, j);
        if !present.get(r, c) {
            ds.set_cell_unchecked(r, c, rebuilt[j].clone())?;
            present.set(r, c);
        }
    }

    Ok((true, true))
}

/// Reconstructs `ds` in place from its currently present cells, verifying
/// against `row_roots`/`col_roots`. See the module docs for the contract.
pub fn repair(
    ds: &mut DataSquare,
    codec: &dyn Codec,
    tree_ctor: &TreeConstructorFn,
    original_data_width: usize,
    row_roots: &[Vec<u8>],
    col_roots: &[Vec<u8>],
) -> Result<()> {
    let width = ds.width();
    sanity_check(ds, codec, tree_ctor, original_data_width, row_roots, col_roots)?;

    let mut present = BitMatrix::new(width);
    for r in 0..width {
        for c in 0..width {
            if ds.get(r, c)?.is_some() {
                present.set(r, c);
            }
        }
    }

    let mut iteration = 0u32;
    loop {
        iteration += 1;
        let mut solved = true;
        let mut progress = false;

        for i in 0..width {
            let (s, p) = solve_axis(ds, codec, tree_ctor, &mut present, Axis::Row, i, row_roots, col_roots)?;
            solved &= s;
            progress |= p;
        }
        for i in 0..width {
            let (s, p) = solve_axis(ds, codec, tree_ctor, &mut present, Axis::Col, i, row_roots, col_roots)?;
            solved &= s;
            progress |= p;
        }

        let remaining = (0..width)
            .flat_map(|r| (0..width).map(move |c| (r, c)))
            .filter(|&(r, c)| !present.get(r, c))
            .count();
        tracing::debug!(iteration, remaining, progress, "crossword: outer iteration complete");

        if solved {
            tracing::trace!(iteration, "crossword: square fully repaired");
            return Ok(());
        }
        if !progress {
            tracing::trace!(iteration, remaining, "crossword: stalled with no progress");
            return Err(Error::Unrepairable);
        }
    }
}
