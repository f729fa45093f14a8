//! End-to-end scenarios exercising construction, repair, and Byzantine
//! detection entirely through the public API.

use std::sync::Arc;

use rsmt2d::codec::GaloisCodec;
use rsmt2d::tree::{NmtTree, Sha256Tree};
use rsmt2d::{Error, ExtendedDataSquare, TreeConstructorFn};

const CHUNK_SIZE: usize = 512;

fn chunk(byte: u8) -> Vec<u8> {
    vec![byte; CHUNK_SIZE]
}

fn sha256_ctor() -> TreeConstructorFn {
    Arc::new(Sha256Tree::new_ctor)
}

/// `ODS = [ones, twos; threes, fours]`, computed into a full 4x4 EDS.
fn reference() -> ExtendedDataSquare {
    let ods = vec![chunk(0x01), chunk(0x02), chunk(0x03), chunk(0x04)];
    ExtendedDataSquare::compute(ods, Box::new(GaloisCodec::new()), sha256_ctor()).unwrap()
}

fn sparse_from(reference: &ExtendedDataSquare, erased: &[usize]) -> ExtendedDataSquare {
    let mut flat = reference.flattened();
    for &i in erased {
        flat[i] = None;
    }
    ExtendedDataSquare::import(flat, Box::new(GaloisCodec::new()), sha256_ctor()).unwrap()
}

#[test]
fn s1_roundtrip_simple() {
    let mut reference = reference();
    let row_roots = reference.row_roots().unwrap();
    let col_roots = reference.col_roots().unwrap();

    let erased = [0usize, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 13];
    let mut sparse = sparse_from(&reference, &erased);

    sparse.repair(&row_roots, &col_roots).unwrap();

    assert_eq!(sparse.get_cell(0, 0).unwrap(), Some(chunk(0x01)));
    assert_eq!(sparse.get_cell(0, 1).unwrap(), Some(chunk(0x02)));
    assert_eq!(sparse.get_cell(1, 0).unwrap(), Some(chunk(0x03)));
    assert_eq!(sparse.get_cell(1, 1).unwrap(), Some(chunk(0x04)));
}

#[test]
fn s2_unrepairable() {
    let mut reference = reference();
    let row_roots = reference.row_roots().unwrap();
    let col_roots = reference.col_roots().unwrap();

    let erased = [0usize, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 13, 14];
    let mut sparse = sparse_from(&reference, &erased);

    let err = sparse.repair(&row_roots, &col_roots).unwrap_err();
    assert!(matches!(err, Error::Unrepairable));
}

#[test]
fn s3_two_phase_repair() {
    let mut reference = reference();
    let row_roots = reference.row_roots().unwrap();
    let col_roots = reference.col_roots().unwrap();

    let mut erased = vec![0usize, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 13];
    erased.push(1);
    let mut sparse = sparse_from(&reference, &erased);
    let err = sparse.repair(&row_roots, &col_roots).unwrap_err();
    assert!(matches!(err, Error::Unrepairable));

    // Restore cell 1 (flat index 1 = (0, 1)) to its honest value and retry.
    let mut flat = sparse.flattened();
    flat[1] = reference.get_cell(0, 1).unwrap();
    let mut restored =
        ExtendedDataSquare::import(flat, Box::new(GaloisCodec::new()), sha256_ctor()).unwrap();

    restored.repair(&row_roots, &col_roots).unwrap();
    assert_eq!(restored.get_cell(0, 0).unwrap(), Some(chunk(0x01)));
    assert_eq!(restored.get_cell(1, 1).unwrap(), Some(chunk(0x04)));
}

#[test]
fn s4_byzantine_original_quadrant_corruption() {
    let mut reference = reference();
    let row_roots = reference.row_roots().unwrap();
    let col_roots = reference.col_roots().unwrap();

    let mut flat = reference.flattened();
    flat[0] = Some(chunk(0x42));
    let mut corrupted =
        ExtendedDataSquare::import(flat, Box::new(GaloisCodec::new()), sha256_ctor()).unwrap();

    let err = corrupted.repair(&row_roots, &col_roots).unwrap_err();
    match err {
        Error::ByzantineData { shares, .. } => {
            assert_eq!(shares[0], Some(chunk(0x42)));
        }
        other => panic!("expected ByzantineData, got {other:?}"),
    }
}

#[test]
fn s5_quarter_populated_assembly() {
    let mut reference = reference();
    let row_roots = reference.row_roots().unwrap();
    let col_roots = reference.col_roots().unwrap();

    let mut eds =
        ExtendedDataSquare::new_empty(Box::new(GaloisCodec::new()), sha256_ctor(), 4, CHUNK_SIZE)
            .unwrap();
    for r in 0..2 {
        for c in 0..2 {
            eds.set_cell(r, c, reference.get_cell(r, c).unwrap().unwrap())
                .unwrap();
        }
    }
    assert_eq!(eds.get_cell(3, 3).unwrap(), None);

    eds.repair(&row_roots, &col_roots).unwrap();
    assert_eq!(eds.flattened(), reference.flattened());
}

#[test]
fn s6_unordered_nmt_shares() {
    let original_data_width = 2;
    let nmt_ctor = NmtTree::new_ctor(original_data_width);

    let mut high_ns = vec![0u8; 8];
    high_ns[7] = 2;
    let mut low_ns = vec![0u8; 8];
    low_ns[7] = 1;

    let mut cell_high = high_ns.clone();
    cell_high.resize(CHUNK_SIZE, 0);
    let mut cell_low = low_ns.clone();
    cell_low.resize(CHUNK_SIZE, 0);

    let mut eds =
        ExtendedDataSquare::new_empty(Box::new(GaloisCodec::new()), nmt_ctor, 4, CHUNK_SIZE).unwrap();
    // (0, 0) carries a higher namespace than (0, 1), violating NMT ordering.
    eds.set_cell(0, 0, cell_high).unwrap();
    eds.set_cell(0, 1, cell_low).unwrap();

    let dummy_root = vec![0u8; 8 + 8 + 32];
    let row_roots = vec![dummy_root.clone(); 4];
    let col_roots = vec![dummy_root; 4];

    let err = eds.repair(&row_roots, &col_roots).unwrap_err();
    match err {
        Error::ByzantineData { axis, index, .. } => {
            assert_eq!(axis, rsmt2d::Axis::Row);
            assert_eq!(index, 0);
        }
        other => panic!("expected ByzantineData, got {other:?}"),
    }
}
