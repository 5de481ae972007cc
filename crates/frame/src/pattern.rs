//! Erasure patterns and their cache
//!
//! Pattern `v` of an `n`-shard set discards shard `i` when bit `i` of `v`
//! is set. Enumerating `v = 0, 1, 2, ...` therefore starts with the
//! all-present pattern and ends with the all-erased one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::params::MAX_SEARCH_SHARDS;
use crate::{FrameError, Result};

/// Order in which the search decoder tries patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternOrder {
    /// Ascending pattern index
    #[default]
    Positional,
    /// Most kept shards first, ties broken by pattern index
    MostTrustedFirst,
}

/// Keep/drop decision for every shard of one decode attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErasurePattern {
    index: u32,
    len: u8,
}

impl ErasurePattern {
    /// Pattern number `index` over `len` shards.
    pub fn from_index(index: u32, len: usize) -> Result<Self> {
        if len > MAX_SEARCH_SHARDS {
            return Err(FrameError::PatternSpaceTooLarge { shards: len, max: MAX_SEARCH_SHARDS });
        }
        if u64::from(index) >= 1u64 << len {
            return Err(FrameError::InvalidFormat {
                msg: format!("Pattern index {} out of range for {} shards", index, len),
            });
        }
        Ok(Self { index, len: len as u8 })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bit `i` set when shard `i` is discarded
    pub fn drop_mask(&self) -> u32 {
        self.index
    }

    /// Bit `i` set when shard `i` is kept
    pub fn keep_mask(&self) -> u32 {
        !self.index & self.full_mask()
    }

    fn full_mask(&self) -> u32 {
        ((1u64 << self.len) - 1) as u32
    }

    pub fn keeps(&self, shard: usize) -> bool {
        shard < self.len() && self.index & (1 << shard) == 0
    }

    pub fn kept_count(&self) -> usize {
        self.keep_mask().count_ones() as usize
    }

    /// One entry per shard, 1 = kept
    pub fn to_bits(&self) -> Vec<u8> {
        (0..self.len()).map(|i| u8::from(self.keeps(i))).collect()
    }
}

/// Every pattern over `shards` positions in the requested order.
pub fn generate_patterns(shards: usize, order: PatternOrder) -> Result<Vec<ErasurePattern>> {
    if shards > MAX_SEARCH_SHARDS {
        return Err(FrameError::PatternSpaceTooLarge { shards, max: MAX_SEARCH_SHARDS });
    }
    let len = shards as u8;
    let mut patterns: Vec<ErasurePattern> =
        (0..1u32 << shards).map(|index| ErasurePattern { index, len }).collect();

    if order == PatternOrder::MostTrustedFirst {
        // stable sort keeps ascending index within one popcount
        patterns.sort_by_key(|p| std::cmp::Reverse(p.kept_count()));
    }
    Ok(patterns)
}

type PatternKey = (usize, PatternOrder);

/// Pattern lists keyed by shard count and order, built on first use
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: RwLock<HashMap<PatternKey, Arc<[ErasurePattern]>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the patterns for `shards`, computing them once under the write lock.
    pub fn get(&self, shards: usize, order: PatternOrder) -> Result<Arc<[ErasurePattern]>> {
        let key = (shards, order);
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(patterns) = entries.get(&key) {
                return Ok(Arc::clone(patterns));
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(patterns) = entries.get(&key) {
            return Ok(Arc::clone(patterns));
        }
        let patterns: Arc<[ErasurePattern]> = generate_patterns(shards, order)?.into();
        debug!(shards, ?order, count = patterns.len(), "computed erasure patterns");
        entries.insert(key, Arc::clone(&patterns));
        Ok(patterns)
    }

    /// Build the patterns ahead of time, e.g. before starting parallel trials.
    pub fn warm(&self, shards: usize, order: PatternOrder) -> Result<()> {
        self.get(shards, order).map(|_| ())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
