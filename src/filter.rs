use crate::block::BucketBlock;
use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::hash::HashFamily;
use crate::traits::{BucketFilterOps, BucketFilterStats, BulkBucketFilterOps};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Latest reachable time. Times and bucket indices are addressed as signed
/// 64-bit integers on every command surface.
pub const MAX_TIME: u64 = i64::MAX as u64;

/// Time-bucketed Bloom filter owned by a single key.
///
/// Holds a ring of `num_buckets` blocks; bucket `b` lives in slot
/// `b % num_buckets`. The live window is `[max(0, T - B + 1), T]` where `T`
/// is the current time. Whenever `T` changes, blocks whose generation falls
/// outside the window are reset eagerly, so queries never observe evicted
/// buckets and no two live buckets ever share a slot.
pub struct BucketFilter {
    config: FilterConfig,
    hashes: HashFamily,
    blocks: Vec<BucketBlock>,
    current_time: u64,
}

/// Per-bucket statistics reported by [`BucketFilter::info`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct BucketInfo {
    pub bucket: u64,
    pub insert_count: u64,
    pub fill_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct FilterInfo {
    pub current_time: u64,
    pub window_start: u64,
    pub num_buckets: usize,
    pub bits_per_block: usize,
    pub num_hashes: usize,
    pub total_insert_count: u64,
    pub estimated_fpr: f64,
    pub buckets: Vec<BucketInfo>,
}

impl BucketFilter {
    pub fn new(config: FilterConfig) -> Result<Self> {
        let params = config.params()?;
        let hashes = params.hash_family()?;
        let blocks = (0..config.num_buckets)
            .map(|_| BucketBlock::new(params.bits_per_block))
            .collect();

        Ok(Self {
            config,
            hashes,
            blocks,
            current_time: 0,
        })
    }

    /// Reassembles a filter from decoded parts, checking that the ring
    /// matches the configuration.
    pub(crate) fn from_parts(
        config: FilterConfig,
        current_time: u64,
        blocks: Vec<BucketBlock>,
    ) -> Result<Self> {
        let params = config.params()?;
        let hashes = params.hash_family()?;

        if current_time > MAX_TIME {
            return Err(FilterError::SerializationError(format!(
                "current time {current_time} exceeds {MAX_TIME}"
            )));
        }
        if blocks.len() != config.num_buckets {
            return Err(FilterError::SerializationError(format!(
                "expected {} blocks, found {}",
                config.num_buckets,
                blocks.len()
            )));
        }
        if let Some(block) =
            blocks.iter().find(|b| b.width() != params.bits_per_block)
        {
            return Err(FilterError::SerializationError(format!(
                "expected block width {}, found {}",
                params.bits_per_block,
                block.width()
            )));
        }

        let mut filter = Self {
            config,
            hashes,
            blocks,
            current_time,
        };
        filter.retain_window();
        Ok(filter)
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub(crate) fn blocks(&self) -> &[BucketBlock] {
        &self.blocks
    }

    /// Oldest bucket index still inside the window.
    pub fn window_start(&self) -> u64 {
        self.current_time
            .saturating_sub(self.blocks.len() as u64 - 1)
    }

    pub fn in_window(&self, bucket: u64) -> bool {
        bucket >= self.window_start() && bucket <= self.current_time
    }

    fn slot(&self, bucket: u64) -> usize {
        (bucket % self.blocks.len() as u64) as usize
    }

    fn check_item(&self, item: &[u8]) -> Result<()> {
        if item.len() > self.config.max_item_len {
            return Err(FilterError::InvalidItem {
                len: item.len(),
                max: self.config.max_item_len,
            });
        }
        Ok(())
    }

    /// Resets every block whose bucket left the window, returns how many.
    fn retain_window(&mut self) -> usize {
        let start = self.window_start();
        let now = self.current_time;
        let mut evicted = 0;

        for block in self.blocks.iter_mut() {
            if let Some(generation) = block.generation() {
                if generation < start || generation > now {
                    block.clear();
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            debug!(
                current_time = now,
                window_start = start,
                evicted,
                "evicted buckets outside window"
            );
        }
        evicted
    }

    fn insert_positions(&mut self, positions: &[usize]) {
        let now = self.current_time;
        let slot = self.slot(now);
        let block = &mut self.blocks[slot];
        if block.generation() != Some(now) {
            block.reset(Some(now));
        }
        block.set_bits(positions);
    }

    fn contains_positions(&self, positions: &[usize]) -> bool {
        self.blocks.iter().any(|block| {
            block.generation().is_some_and(|g| self.in_window(g))
                && block.contains_all(positions)
        })
    }

    /// Probability that an item never inserted is reported present,
    /// estimated from the fill ratio of every live block.
    pub fn estimated_fpr(&self) -> f64 {
        let k = self.hashes.num_hashes() as i32;
        let miss_all = self
            .blocks
            .iter()
            .filter(|block| !block.is_unused())
            .map(|block| 1.0 - block.fill_ratio().powi(k))
            .product::<f64>();
        1.0 - miss_all
    }

    pub fn info(&self) -> FilterInfo {
        let mut buckets: Vec<BucketInfo> = self
            .blocks
            .iter()
            .filter_map(|block| {
                block.generation().map(|bucket| BucketInfo {
                    bucket,
                    insert_count: block.insert_count(),
                    fill_ratio: block.fill_ratio(),
                })
            })
            .collect();
        buckets.sort_by_key(|b| b.bucket);

        FilterInfo {
            current_time: self.current_time,
            window_start: self.window_start(),
            num_buckets: self.blocks.len(),
            bits_per_block: self.hashes.num_bits(),
            num_hashes: self.hashes.num_hashes(),
            total_insert_count: self.total_insert_count(),
            estimated_fpr: self.estimated_fpr(),
            buckets,
        }
    }
}

/// Converts a caller-supplied time or bucket index, rejecting negatives.
fn bucket_index(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        FilterError::InvalidTime(format!(
            "{what} must be non-negative, got {value}"
        ))
    })
}

impl BucketFilterOps for BucketFilter {
    fn insert(&mut self, item: &[u8]) -> Result<()> {
        self.check_item(item)?;
        let positions = self.hashes.positions(item);
        self.insert_positions(&positions);
        Ok(())
    }

    fn exists(&self, item: &[u8]) -> Result<bool> {
        self.check_item(item)?;
        let positions = self.hashes.positions(item);
        Ok(self.contains_positions(&positions))
    }

    fn advance_time(&mut self, delta: u64) -> Result<u64> {
        if delta == 0 {
            return Err(FilterError::InvalidTime(
                "time delta must be at least 1".to_string(),
            ));
        }
        let next = self
            .current_time
            .checked_add(delta)
            .filter(|&next| next <= MAX_TIME)
            .ok_or_else(|| {
                FilterError::InvalidTime(format!(
                    "advancing {} by {delta} passes {MAX_TIME}",
                    self.current_time
                ))
            })?;

        self.current_time = next;
        self.retain_window();
        Ok(next)
    }

    fn set_time(&mut self, time: i64) -> Result<()> {
        let time = bucket_index(time, "time")?;
        if time < self.current_time {
            debug!(from = self.current_time, to = time, "rolling time back");
        }
        self.current_time = time;
        self.retain_window();
        Ok(())
    }

    fn clear_time(&mut self, bucket: i64) -> Result<bool> {
        let bucket = bucket_index(bucket, "bucket index")?;
        let slot = self.slot(bucket);
        let block = &mut self.blocks[slot];

        if block.generation() != Some(bucket) {
            return Ok(false);
        }
        block.clear();
        debug!(bucket, slot, "cleared bucket");
        Ok(true)
    }

    fn clear(&mut self) {
        for block in self.blocks.iter_mut() {
            block.clear();
        }
        self.current_time = 0;
    }
}

impl BulkBucketFilterOps for BucketFilter {
    fn insert_bulk(&mut self, items: &[&[u8]]) -> Result<()> {
        // Validate everything first so a bad item leaves the filter untouched
        for item in items {
            self.check_item(item)?;
        }
        for item in items {
            let positions = self.hashes.positions(item);
            self.insert_positions(&positions);
        }
        Ok(())
    }

    fn exists_bulk(&self, items: &[&[u8]]) -> Result<Vec<bool>> {
        for item in items {
            self.check_item(item)?;
        }
        Ok(items
            .iter()
            .map(|item| self.contains_positions(&self.hashes.positions(item)))
            .collect())
    }
}

impl BucketFilterStats for BucketFilter {
    fn num_buckets(&self) -> usize {
        self.blocks.len()
    }

    fn bits_per_block(&self) -> usize {
        self.hashes.num_bits()
    }

    fn num_hashes(&self) -> usize {
        self.hashes.num_hashes()
    }

    fn current_time(&self) -> u64 {
        self.current_time
    }

    fn live_buckets(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_unused()).count()
    }

    fn total_insert_count(&self) -> u64 {
        self.blocks.iter().map(|b| b.insert_count()).sum()
    }
}

impl std::fmt::Debug for BucketFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BucketFilter {{ num_buckets: {}, bits_per_block: {}, num_hashes: {}, current_time: {}, live_buckets: {} }}",
            self.blocks.len(),
            self.hashes.num_bits(),
            self.hashes.num_hashes(),
            self.current_time,
            self.live_buckets()
        )
    }
}
