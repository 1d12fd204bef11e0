use crate::error::{FilterError, Result};
use crate::hash::{HashFamily, optimal_bit_vector_size, optimal_num_hashes};
use bincode::{Decode, Encode};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPACITY_PER_BUCKET: usize = 10_000;
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;
pub const DEFAULT_NUM_BUCKETS: usize = 16;
pub const DEFAULT_MAX_ITEM_LEN: usize = 64 * 1024;

/// Widest accepted block, 512 MiB of bits.
pub const MAX_BITS_PER_BLOCK: u64 = 1 << 32;
/// Upper bound on the bits of all blocks of one filter, 8 GiB.
pub const MAX_BITS_PER_FILTER: u64 = 1 << 36;
pub const MAX_NUM_BUCKETS: usize = 1 << 16;
pub const MAX_NUM_HASHES: usize = 64;

/// Configuration shared by every per-key filter
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize, Encode, Decode)]
#[builder(pattern = "owned")]
pub struct FilterConfig {
    /// Expected number of items inserted during one time bucket
    #[builder(default = "DEFAULT_CAPACITY_PER_BUCKET")]
    pub capacity_per_bucket: usize,

    /// Target false positive rate of a single bucket (between 0 and 1)
    #[builder(default = "DEFAULT_FALSE_POSITIVE_RATE")]
    pub false_positive_rate: f64,

    /// Number of retained time buckets (the window size)
    #[builder(default = "DEFAULT_NUM_BUCKETS")]
    pub num_buckets: usize,

    /// Longest accepted item, in bytes
    #[builder(default = "DEFAULT_MAX_ITEM_LEN")]
    pub max_item_len: usize,

    /// Explicit bit width per block, overrides the capacity/fpr sizing
    #[builder(default, setter(strip_option))]
    pub bits_per_block: Option<usize>,

    /// Explicit number of hash functions, overrides the capacity/fpr sizing
    #[builder(default, setter(strip_option))]
    pub num_hashes: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            capacity_per_bucket: DEFAULT_CAPACITY_PER_BUCKET,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            num_buckets: DEFAULT_NUM_BUCKETS,
            max_item_len: DEFAULT_MAX_ITEM_LEN,
            bits_per_block: None,
            num_hashes: None,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity_per_bucket == 0 {
            return Err(FilterError::InvalidConfig(
                "Capacity per bucket must be greater than 0".to_string(),
            ));
        }
        if self.false_positive_rate <= 0.0 || self.false_positive_rate >= 1.0 {
            return Err(FilterError::InvalidConfig(
                "False positive rate must be between 0 and 1".to_string(),
            ));
        }
        if self.num_buckets == 0 {
            return Err(FilterError::InvalidConfig(
                "Number of buckets must be greater than 0".to_string(),
            ));
        }
        if self.num_buckets > MAX_NUM_BUCKETS {
            return Err(FilterError::InvalidConfig(format!(
                "Number of buckets must be at most {MAX_NUM_BUCKETS}"
            )));
        }
        if self.max_item_len == 0 {
            return Err(FilterError::InvalidConfig(
                "Maximum item length must be greater than 0".to_string(),
            ));
        }
        if self.bits_per_block == Some(0) {
            return Err(FilterError::InvalidConfig(
                "Bit array width must be greater than 0".to_string(),
            ));
        }
        if self.num_hashes == Some(0) {
            return Err(FilterError::InvalidConfig(
                "Number of hash functions must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the config and resolves the block width and hash count.
    pub fn params(&self) -> Result<FilterParams> {
        self.validate()?;
        let bits_per_block = self.bits_per_block.unwrap_or_else(|| {
            optimal_bit_vector_size(
                self.capacity_per_bucket,
                self.false_positive_rate,
            )
        });
        if bits_per_block as u64 > MAX_BITS_PER_BLOCK {
            return Err(FilterError::InvalidConfig(format!(
                "Bit array width {bits_per_block} exceeds maximum {MAX_BITS_PER_BLOCK}"
            )));
        }
        let fits = (bits_per_block as u64)
            .checked_mul(self.num_buckets as u64)
            .is_some_and(|total| total <= MAX_BITS_PER_FILTER);
        if !fits {
            return Err(FilterError::InvalidConfig(format!(
                "{} buckets of {bits_per_block} bits exceed the per-filter maximum of {MAX_BITS_PER_FILTER} bits",
                self.num_buckets
            )));
        }
        // Derived counts are clamped, explicit ones must fit
        let num_hashes = self.num_hashes.unwrap_or_else(|| {
            optimal_num_hashes(self.capacity_per_bucket, bits_per_block)
                .min(MAX_NUM_HASHES)
        });
        if num_hashes > MAX_NUM_HASHES {
            return Err(FilterError::InvalidConfig(format!(
                "Number of hash functions {num_hashes} exceeds maximum {MAX_NUM_HASHES}"
            )));
        }

        Ok(FilterParams {
            bits_per_block,
            num_hashes,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Derived parameters calculated from FilterConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterParams {
    pub bits_per_block: usize,
    pub num_hashes: usize,
}

impl FilterParams {
    pub fn hash_family(&self) -> Result<HashFamily> {
        HashFamily::new(self.num_hashes, self.bits_per_block)
    }

    /// Memory taken by the bit arrays of one filter with `num_buckets` blocks.
    pub fn bytes_per_filter(&self, num_buckets: usize) -> usize {
        self.bits_per_block.div_ceil(8).saturating_mul(num_buckets)
    }
}
