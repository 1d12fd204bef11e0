use crate::error::{FilterError, Result};
use fnv::FnvHasher;
use murmur3::murmur3_x64_128;
use std::hash::Hasher;
use std::io::Cursor;

/// Deterministic family of `k` hash functions over byte strings, mapping
/// each item to `k` bit positions in `[0, m)`.
///
/// Positions are derived by double hashing, `h1 + i * h2 (mod m)`, so only
/// two full hashes are computed per item regardless of `k`:
///
/// - `h1` is the low 64 bits of Murmur3 x64_128
/// - `h2` is FNV-1a 64, forced odd so consecutive hashes never collapse
///   onto the same position when `h2` would otherwise be zero
///
/// Neither hash is randomly seeded, so positions are stable across process
/// restarts and snapshots stay comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashFamily {
    num_hashes: usize,
    num_bits: usize,
}

impl HashFamily {
    pub fn new(num_hashes: usize, num_bits: usize) -> Result<Self> {
        if num_hashes == 0 {
            return Err(FilterError::InvalidConfig(
                "Number of hash functions must be greater than 0".to_string(),
            ));
        }
        if num_bits == 0 {
            return Err(FilterError::InvalidConfig(
                "Bit array width must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            num_hashes,
            num_bits,
        })
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn positions(&self, item: &[u8]) -> Vec<usize> {
        let h1 = hash_murmur64(item);
        let h2 = hash_fnv64(item) | 1;
        let m = self.num_bits as u64;
        (0..self.num_hashes as u64)
            .map(|i| (h1.wrapping_add(i.wrapping_mul(h2)) % m) as usize)
            .collect()
    }
}

pub(crate) fn hash_murmur64(key: &[u8]) -> u64 {
    let mut cursor = Cursor::new(key);
    // Reading from an in-memory slice cannot fail.
    murmur3_x64_128(&mut cursor, 0).unwrap_or_default() as u64
}

pub(crate) fn hash_fnv64(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish()
}

/// Bits needed for `n` items at false positive rate `fpr`.
pub fn optimal_bit_vector_size(n: usize, fpr: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    (((-(n as f64) * fpr.ln()) / (ln2 * ln2)).ceil() as usize).max(1)
}

pub fn optimal_num_hashes(n: usize, m: usize) -> usize {
    (((m as f64 / n as f64) * std::f64::consts::LN_2).round() as usize).max(1)
}
