use bitvec::prelude::*;

/// Bit array holding the membership state of a single time bucket.
///
/// The generation tag names the bucket index the block currently represents;
/// `None` marks a block that belongs to no bucket. Blocks are only ever reset
/// as a whole, never cleared item by item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketBlock {
    bits: BitVec<u64, Lsb0>,
    generation: Option<u64>,
    insert_count: u64,
}

impl BucketBlock {
    pub fn new(width: usize) -> Self {
        Self {
            bits: bitvec![u64, Lsb0; 0; width],
            generation: None,
            insert_count: 0,
        }
    }

    /// Rebuilds a block from raw words, trimming padding beyond `width`.
    pub(crate) fn from_raw_parts(
        width: usize,
        words: Vec<u64>,
        generation: Option<u64>,
        insert_count: u64,
    ) -> Option<Self> {
        if words.len() != width.div_ceil(u64::BITS as usize) {
            return None;
        }
        let mut bits = BitVec::<u64, Lsb0>::from_vec(words);
        bits.truncate(width);
        Some(Self {
            bits,
            generation,
            insert_count,
        })
    }

    pub(crate) fn raw_words(&self) -> &[u64] {
        self.bits.as_raw_slice()
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn is_unused(&self) -> bool {
        self.generation.is_none()
    }

    pub fn insert_count(&self) -> u64 {
        self.insert_count
    }

    /// Zeroes every bit and marks the block unused.
    pub fn clear(&mut self) {
        self.reset(None);
    }

    /// Zeroes every bit and re-tags the block for `generation`.
    pub fn reset(&mut self, generation: Option<u64>) {
        self.bits.fill(false);
        self.generation = generation;
        self.insert_count = 0;
    }

    pub fn set_bit(&mut self, pos: usize) {
        debug_assert!(pos < self.bits.len());
        self.bits.set(pos, true);
    }

    pub fn test_bit(&self, pos: usize) -> bool {
        self.bits.get(pos).map(|bit| *bit).unwrap_or(false)
    }

    /// Sets every position and counts one insertion.
    pub fn set_bits(&mut self, positions: &[usize]) {
        for &pos in positions {
            self.set_bit(pos);
        }
        self.insert_count += 1;
    }

    pub fn contains_all(&self, positions: &[usize]) -> bool {
        positions.iter().all(|&pos| self.test_bit(pos))
    }

    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn fill_ratio(&self) -> f64 {
        if self.bits.is_empty() {
            return 0.0;
        }
        self.count_ones() as f64 / self.bits.len() as f64
    }
}
