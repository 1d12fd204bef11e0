//! Time-bucketed Bloom filters, one independent filter per key.
//!
//! Every key owns a ring of bit arrays ("blocks"), one per discrete time
//! bucket. Items always land in the block of the current bucket, and a whole
//! bucket can be evicted at once by resetting its block, without touching
//! items recorded in other buckets.
//!
//! HowTo:
//!    * Buckets: the filter keeps the `B` most recent buckets `[T - B + 1, T]`
//!      where `T` is the current time, a plain counter moved by the host.
//!    * Slots: bucket `b` lives in ring slot `b mod B`; each block carries the
//!      bucket index it currently represents as a generation tag.
//!
//! Insertion:
//!     * Hash the item with k double-hashed functions and set the bits in the
//!       block of bucket `T`, re-tagging the block first if it belonged to an
//!       older bucket.
//! Query:
//!     * An item is present if all k bits are set in any live block.
//! Expiration:
//!     * Moving `T` (INCTIME / SETTIME) resets every block that fell out of
//!       the window, including buckets "in the future" after a rollback.
//!     * CLRTIME resets a single bucket's block on demand.
//!
//! Guarantees:
//!     * No false negatives for items whose bucket is live and not cleared.
//!     * Keys never share blocks, so keys never see each other's items.
//!     * Eviction cost depends on the block width, never on item count.

#[cfg(feature = "server")]
pub mod api;
pub mod block;
pub mod command;
pub mod common;
pub mod config;
mod error;
pub mod filter;
mod hash;
pub mod registry;
pub mod resp;
mod snapshot;
mod traits;
#[cfg(feature = "server")]
pub mod types;

pub use block::BucketBlock;
pub use command::{Command, CommandAdapter, Reply};
pub use config::{
    FilterConfig, FilterConfigBuilder, FilterConfigBuilderError, FilterParams,
};
pub use error::{FilterError, Result};
pub use filter::{BucketFilter, BucketInfo, FilterInfo};
pub use hash::{HashFamily, optimal_bit_vector_size, optimal_num_hashes};
pub use registry::{KeyRegistry, SharedFilter, lock_filter};
pub use traits::{BucketFilterOps, BucketFilterStats, BulkBucketFilterOps};
#[cfg(feature = "server")]
pub use types::{
    AppState, ServerConfig, ServerConfigBuilder, ServerConfigBuilderError,
};
