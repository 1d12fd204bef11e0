//! Binary snapshots of filter state.
//!
//! A filter is stored as its config, current time, and every block's
//! generation tag, insert counter and raw bit words. Decoding rebuilds the
//! ring through [`BucketFilter::from_parts`], which rejects blobs whose ring
//! does not match the stored config.

use crate::block::BucketBlock;
use crate::common::display_bytes;
use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::filter::BucketFilter;
use crate::traits::BucketFilterStats;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode)]
struct BlockSnapshot {
    generation: Option<u64>,
    insert_count: u64,
    words: Vec<u64>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct FilterSnapshot {
    config: FilterConfig,
    current_time: u64,
    blocks: Vec<BlockSnapshot>,
}

#[derive(Debug, Encode, Decode)]
struct RegistrySnapshot {
    config: FilterConfig,
    entries: Vec<(Vec<u8>, FilterSnapshot)>,
}

impl FilterSnapshot {
    pub(crate) fn capture(filter: &BucketFilter) -> Self {
        let blocks = filter
            .blocks()
            .iter()
            .map(|block| BlockSnapshot {
                generation: block.generation(),
                insert_count: block.insert_count(),
                words: block.raw_words().to_vec(),
            })
            .collect();

        Self {
            config: filter.config().clone(),
            current_time: filter.current_time(),
            blocks,
        }
    }

    fn into_filter(self) -> Result<BucketFilter> {
        let width = self.config.params()?.bits_per_block;
        let blocks = self
            .blocks
            .into_iter()
            .map(|b| {
                BucketBlock::from_raw_parts(
                    width,
                    b.words,
                    b.generation,
                    b.insert_count,
                )
                .ok_or_else(|| {
                    FilterError::SerializationError(format!(
                        "block does not match width {width}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        BucketFilter::from_parts(self.config, self.current_time, blocks)
    }
}

impl BucketFilter {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let snapshot = FilterSnapshot::capture(self);
        Ok(bincode::encode_to_vec(snapshot, bincode::config::standard())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _): (FilterSnapshot, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;
        snapshot.into_filter()
    }
}

pub(crate) fn encode_registry(
    config: &FilterConfig,
    entries: Vec<(Vec<u8>, FilterSnapshot)>,
) -> Result<Vec<u8>> {
    let snapshot = RegistrySnapshot {
        config: config.clone(),
        entries,
    };
    Ok(bincode::encode_to_vec(snapshot, bincode::config::standard())?)
}

pub(crate) fn decode_registry(
    bytes: &[u8],
) -> Result<(FilterConfig, Vec<(Vec<u8>, BucketFilter)>)> {
    let (snapshot, _): (RegistrySnapshot, usize) =
        bincode::decode_from_slice(bytes, bincode::config::standard())?;

    let mut entries = Vec::with_capacity(snapshot.entries.len());
    for (key, filter) in snapshot.entries {
        if filter.config != snapshot.config {
            return Err(FilterError::SerializationError(format!(
                "filter for key '{}' does not match registry config",
                display_bytes(&key)
            )));
        }
        entries.push((key, filter.into_filter()?));
    }
    Ok((snapshot.config, entries))
}
