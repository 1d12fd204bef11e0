use crate::error::Result;

/// Core operations of a time-bucketed filter
pub trait BucketFilterOps {
    /// Record an item in the bucket of the current time
    fn insert(&mut self, item: &[u8]) -> Result<()>;

    /// Check if an item was recorded in any bucket of the live window
    fn exists(&self, item: &[u8]) -> Result<bool>;

    /// Move the current time forward by `delta` buckets, returns the new time
    fn advance_time(&mut self, delta: u64) -> Result<u64>;

    /// Set the current time to an absolute bucket index
    fn set_time(&mut self, time: i64) -> Result<()>;

    /// Evict every item recorded in one bucket, returns whether anything was dropped
    fn clear_time(&mut self, bucket: i64) -> Result<bool>;

    /// Drop all buckets and rewind time to zero
    fn clear(&mut self);
}

/// Bulk operations for time-bucketed filters
pub trait BulkBucketFilterOps {
    fn insert_bulk(&mut self, items: &[&[u8]]) -> Result<()>;
    fn exists_bulk(&self, items: &[&[u8]]) -> Result<Vec<bool>>;
}

/// Statistics for time-bucketed filters
pub trait BucketFilterStats {
    fn num_buckets(&self) -> usize;
    fn bits_per_block(&self) -> usize;
    fn num_hashes(&self) -> usize;
    fn current_time(&self) -> u64;
    fn live_buckets(&self) -> usize;
    fn total_insert_count(&self) -> u64;
}
