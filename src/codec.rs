//! Codec trait and implementations for Reed-Solomon encoding/decoding.
//!
//! A codec is a systematic `(k, 2k)` erasure code applied independently to
//! every row and every column of an [`ExtendedDataSquare`](crate::ExtendedDataSquare).
//! `encode` always returns the full `2k`-chunk codeword (the original `k`
//! chunks followed by `k` parity chunks); `decode` accepts `2k` optional
//! shares and reconstructs the full codeword once at least `k` of them are
//! present, at any positions.

use reed_solomon_erasure::galois_16::ReedSolomon as ReedSolomon16;
use reed_solomon_erasure::galois_8::ReedSolomon as ReedSolomon8;

use crate::error::{Error, Result};

/// Trait for Reed-Solomon codec implementations.
pub trait Codec: Send + Sync {
    /// Encodes `k` data chunks into the full `2k`-chunk systematic codeword.
    fn encode(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>>;

    /// Reconstructs the full `2k`-chunk codeword from `shares`, which must
    /// hold at least `k` non-`None` entries at any positions.
    fn decode(&self, shares: &[Option<Vec<u8>>]) -> Result<Vec<Vec<u8>>>;

    /// The maximum number of ODS cells (`k²`) this codec supports.
    fn max_chunks(&self) -> usize;

    /// Human-readable codec name, used by the registry.
    fn name(&self) -> &str;

    /// Validates that `chunk_size` is usable with this codec.
    fn validate_chunk_size(&self, chunk_size: usize) -> Result<()>;
}

fn validate_uniform(data: &[Vec<u8>]) -> Result<usize> {
    let len = data.first().map(|c| c.len()).unwrap_or(0);
    for chunk in data {
        if chunk.len() != len {
            return Err(Error::InvalidChunkSize {
                expected: len,
                actual: chunk.len(),
            });
        }
    }
    Ok(len)
}

/// The default reference codec: systematic Reed-Solomon over GF(2^8).
///
/// Any chunk size is supported; `k` (the number of data shards per axis)
/// is limited by the backing field to 256 total shards (`k` data + `k`
/// parity), so `k <= 128`.
pub struct GaloisCodec;

impl GaloisCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GaloisCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for GaloisCodec {
    fn encode(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let k = data.len();
        let shard_len = validate_uniform(data)?;

        let rs = ReedSolomon8::new(k, k).map_err(Error::codec)?;
        let mut shards: Vec<Vec<u8>> = data.to_vec();
        shards.extend((0..k).map(|_| vec![0u8; shard_len]));

        rs.encode(&mut shards).map_err(Error::codec)?;
        Ok(shards)
    }

    fn decode(&self, shares: &[Option<Vec<u8>>]) -> Result<Vec<Vec<u8>>> {
        let total = shares.len();
        let k = total / 2;

        let rs = ReedSolomon8::new(k, k).map_err(Error::codec)?;
        let mut shards = shares.to_vec();
        rs.reconstruct(&mut shards).map_err(Error::codec)?;

        shards
            .into_iter()
            .map(|s| s.ok_or_else(|| Error::Codec(Box::new(DecodeIncomplete))))
            .collect()
    }

    fn max_chunks(&self) -> usize {
        128 * 128
    }

    fn name(&self) -> &str {
        "galois8"
    }

    fn validate_chunk_size(&self, chunk_size: usize) -> Result<()> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize {
                expected: 1,
                actual: 0,
            });
        }
        Ok(())
    }
}

/// The "fast" reference codec: systematic Reed-Solomon over GF(2^16),
/// usable when `k` exceeds [`GaloisCodec`]'s shard-count ceiling. Each
/// field element is two bytes, so `chunk_size` must be even.
pub struct LeopardCodec;

impl LeopardCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LeopardCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for LeopardCodec {
    fn encode(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let k = data.len();
        let shard_len = validate_uniform(data)?;
        self.validate_chunk_size(shard_len)?;

        let rs = ReedSolomon16::new(k, k).map_err(Error::codec)?;
        let mut shards: Vec<Vec<u8>> = data.to_vec();
        shards.extend((0..k).map(|_| vec![0u8; shard_len]));

        rs.encode(&mut shards).map_err(Error::codec)?;
        Ok(shards)
    }

    fn decode(&self, shares: &[Option<Vec<u8>>]) -> Result<Vec<Vec<u8>>> {
        let total = shares.len();
        let k = total / 2;

        let rs = ReedSolomon16::new(k, k).map_err(Error::codec)?;
        let mut shards = shares.to_vec();
        rs.reconstruct(&mut shards).map_err(Error::codec)?;

        shards
            .into_iter()
            .map(|s| s.ok_or_else(|| Error::Codec(Box::new(DecodeIncomplete))))
            .collect()
    }

    fn max_chunks(&self) -> usize {
        // GF(2^16) supports up to 65536 total shards (k data + k parity).
        32_768 * 32_768
    }

    fn name(&self) -> &str {
        "leopard"
    }

    fn validate_chunk_size(&self, chunk_size: usize) -> Result<()> {
        if chunk_size == 0 || chunk_size % 2 != 0 {
            return Err(Error::InvalidChunkSize {
                expected: chunk_size.next_multiple_of(2).max(2),
                actual: chunk_size,
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("codec reconstruction left a share unfilled")]
struct DecodeIncomplete;

/// A process-wide, read-only-after-init registry of known codec
/// constructors, mirroring the tree registry in [`crate::tree::registry`].
pub mod registry {
    use super::Codec;
    use std::collections::HashMap;
    use std::sync::OnceLock;

    type Ctor = fn() -> Box<dyn Codec>;

    static REGISTRY: OnceLock<HashMap<&'static str, Ctor>> = OnceLock::new();

    fn init() -> HashMap<&'static str, Ctor> {
        let mut m: HashMap<&'static str, Ctor> = HashMap::new();
        m.insert("galois8", (|| Box::new(super::GaloisCodec::new()) as Box<dyn Codec>) as Ctor);
        m.insert("leopard", (|| Box::new(super::LeopardCodec::new()) as Box<dyn Codec>) as Ctor);
        m
    }

    /// Looks up a codec constructor by name, constructing a fresh instance.
    pub fn get(name: &str) -> Option<Box<dyn Codec>> {
        REGISTRY.get_or_init(init).get(name).map(|ctor| ctor())
    }
}
