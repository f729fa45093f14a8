//! Tree trait and implementations for per-axis Merkle commitments.
//!
//! A tree is built fresh for one row or one column: the entire axis is
//! pushed in index order, exactly once, then [`Tree::root`] finalizes it.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::Axis;

/// Constructs a fresh [`Tree`] for a given axis and index.
///
/// This is a boxed closure rather than a bare function pointer because the
/// namespaced backend ([`NmtTree`]) must close over the square's original
/// data width (`k`) to classify a row/column as original or parity; that
/// width is not part of the `(Axis, index)` signature the backend trait
/// itself exposes.
pub type TreeConstructorFn = Arc<dyn Fn(Axis, u32) -> Box<dyn Tree> + Send + Sync>;

/// Trait for Merkle tree implementations.
pub trait Tree: Send {
    /// Appends the next leaf of the axis, in index order.
    fn push(&mut self, data: &[u8]) -> Result<()>;

    /// Finalizes and returns the root. Only valid once every leaf of the
    /// axis has been pushed.
    fn root(&self) -> Result<Vec<u8>>;
}

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// The default reference tree: a binary Merkle tree over SHA-256, with
/// domain-separated leaf (`0x00 || chunk`) and interior (`0x01 || left ||
/// right`) hashing. An odd node at any level is carried up unchanged
/// rather than duplicated.
pub struct Sha256Tree {
    leaves: Vec<[u8; 32]>,
}

impl Sha256Tree {
    pub fn new(_axis: Axis, _index: u32) -> Self {
        Self { leaves: Vec::new() }
    }

    /// A [`TreeConstructorFn`]-compatible constructor.
    pub fn new_ctor(axis: Axis, index: u32) -> Box<dyn Tree> {
        Box::new(Self::new(axis, index))
    }

    fn leaf_hash(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(data);
        hasher.finalize().into()
    }

    fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([NODE_PREFIX]);
        hasher.update(left);
        hasher.update(right);
        hasher.finalize().into()
    }
}

impl Tree for Sha256Tree {
    fn push(&mut self, data: &[u8]) -> Result<()> {
        self.leaves.push(Self::leaf_hash(data));
        Ok(())
    }

    fn root(&self) -> Result<Vec<u8>> {
        if self.leaves.is_empty() {
            return Err(Error::tree(EmptyTree));
        }

        let mut level = self.leaves.clone();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                if pair.len() == 2 {
                    next.push(Self::node_hash(&pair[0], &pair[1]));
                } else {
                    next.push(pair[0]);
                }
            }
            level = next;
        }
        Ok(level[0].to_vec())
    }
}

/// Namespace byte-length for [`NmtTree`] leaves.
pub const NS_SIZE: usize = 8;

/// The reserved namespace tag for parity chunks (Q1/Q2/Q3), guaranteed
/// greater than any real (non-reserved) namespace.
pub const PARITY_NAMESPACE: [u8; NS_SIZE] = [0xFF; NS_SIZE];

#[derive(Clone, Copy)]
struct NmtNode {
    min_ns: [u8; NS_SIZE],
    max_ns: [u8; NS_SIZE],
    digest: [u8; 32],
}

/// A namespaced Merkle tree: original-quadrant leaves are tagged with the
/// namespace embedded in their first [`NS_SIZE`] bytes; parity-quadrant
/// leaves use [`PARITY_NAMESPACE`]. Interior nodes additionally commit to
/// the `(min, max)` namespace range of their subtree. [`Tree::root`] fails
/// if the pushed leaves are not namespace-sorted, since an honestly
/// produced axis always is.
pub struct NmtTree {
    axis: Axis,
    index: u32,
    original_data_width: u32,
    position: u32,
    nodes: Vec<NmtNode>,
}

impl NmtTree {
    pub fn new(axis: Axis, index: u32, original_data_width: u32) -> Self {
        Self {
            axis,
            index,
            original_data_width,
            position: 0,
            nodes: Vec::new(),
        }
    }

    /// Builds a [`TreeConstructorFn`] bound to a square's original data
    /// width, suitable for passing to [`crate::ExtendedDataSquare::compute`]
    /// or [`crate::ExtendedDataSquare::import`].
    pub fn new_ctor(original_data_width: u32) -> TreeConstructorFn {
        Arc::new(move |axis, index| {
            Box::new(Self::new(axis, index, original_data_width)) as Box<dyn Tree>
        })
    }

    fn is_original_cell(&self, position_along_axis: u32) -> bool {
        self.index < self.original_data_width && position_along_axis < self.original_data_width
    }
}

impl Tree for NmtTree {
    fn push(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < NS_SIZE {
            return Err(Error::InvalidChunkSize {
                expected: NS_SIZE,
                actual: data.len(),
            });
        }

        let ns = if self.is_original_cell(self.position) {
            let mut ns = [0u8; NS_SIZE];
            ns.copy_from_slice(&data[..NS_SIZE]);
            ns
        } else {
            PARITY_NAMESPACE
        };

        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(ns);
        hasher.update(data);
        let digest = hasher.finalize().into();

        self.nodes.push(NmtNode {
            min_ns: ns,
            max_ns: ns,
            digest,
        });
        self.position += 1;
        Ok(())
    }

    fn root(&self) -> Result<Vec<u8>> {
        if self.nodes.is_empty() {
            return Err(Error::tree(EmptyTree));
        }

        for pair in self.nodes.windows(2) {
            if pair[1].min_ns < pair[0].max_ns {
                tracing::warn!(
                    axis = ?self.axis,
                    index = self.index,
                    "nmt leaves are not namespace-sorted"
                );
                return Err(Error::tree(UnsortedNamespaces));
            }
        }

        let mut level = self.nodes.clone();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                if pair.len() == 2 {
                    let left = &pair[0];
                    let right = &pair[1];
                    let min_ns = left.min_ns.min(right.min_ns);
                    let max_ns = left.max_ns.max(right.max_ns);

                    let mut hasher = Sha256::new();
                    hasher.update([NODE_PREFIX]);
                    hasher.update(min_ns);
                    hasher.update(max_ns);
                    hasher.update(left.digest);
                    hasher.update(right.digest);

                    next.push(NmtNode {
                        min_ns,
                        max_ns,
                        digest: hasher.finalize().into(),
                    });
                } else {
                    next.push(pair[0]);
                }
            }
            level = next;
        }

        let root = &level[0];
        let mut out = Vec::with_capacity(2 * NS_SIZE + 32);
        out.extend_from_slice(&root.min_ns);
        out.extend_from_slice(&root.max_ns);
        out.extend_from_slice(&root.digest);
        Ok(out)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("tree has no leaves")]
struct EmptyTree;

#[derive(Debug, thiserror::Error)]
#[error("nmt leaves were not pushed in namespace order")]
struct UnsortedNamespaces;

/// A process-wide, read-only-after-init registry of known tree
/// constructors that need no extra captured state (the `nmt` backend is
/// not registered here since it requires a width parameter; see
/// [`NmtTree::new_ctor`]).
pub mod registry {
    use super::{Sha256Tree, Tree, TreeConstructorFn};
    use crate::Axis;
    use std::collections::HashMap;
    use std::sync::{Arc, OnceLock};

    type Ctor = fn() -> TreeConstructorFn;

    static REGISTRY: OnceLock<HashMap<&'static str, Ctor>> = OnceLock::new();

    fn sha256_ctor() -> TreeConstructorFn {
        Arc::new(|axis: Axis, index: u32| Box::new(Sha256Tree::new(axis, index)) as Box<dyn Tree>)
    }

    fn init() -> HashMap<&'static str, Ctor> {
        let mut m: HashMap<&'static str, Ctor> = HashMap::new();
        m.insert("sha256", sha256_ctor as Ctor);
        m
    }

    /// Looks up a tree constructor by name.
    pub fn get(name: &str) -> Option<TreeConstructorFn> {
        REGISTRY.get_or_init(init).get(name).map(|ctor| ctor())
    }
}
