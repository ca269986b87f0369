//! Tier 3: the bounded promotion cache for detailed records.
//!
//! Entries are compressed on insert and evicted strictly by least-recent
//! access, one at a time, until the new entry fits. Eviction runs
//! synchronously with the insert; there is no background sweeper.

use lru::LruCache;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::accountant::SizeAccountant;
use crate::cache::codec::{CodecError, RecordCodec};
use crate::cache::record::{CacheEntry, CacheKey, DetailRecord, Tier};

#[derive(Error, Debug)]
pub enum PromoteError {
    /// The record does not fit even with the cache emptied. Anything evicted
    /// on the way stays evicted; the new record is never partially stored.
    #[error("record of {needed} bytes exceeds the remaining tier 3 budget ({budget} bytes)")]
    BudgetExceeded {
        needed: usize,
        budget: usize,
        evicted: Vec<CacheKey>,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// LRU-ordered store of compressed detail records.
///
/// The `LruCache` keeps the recency order; byte budgeting lives in the
/// accountant so that the tier invariant is enforced in one place.
pub struct PromotionCache {
    entries: LruCache<CacheKey, CacheEntry>,
    codec: RecordCodec,
}

impl PromotionCache {
    pub fn new(codec: RecordCodec) -> Self {
        Self {
            entries: LruCache::unbounded(),
            codec,
        }
    }

    /// Compress and insert a record, evicting least-recently-used entries
    /// until it fits.
    ///
    /// Returns the keys evicted to make room. Fails with `BudgetExceeded`
    /// when the record cannot fit even into an empty cache.
    pub fn insert(
        &mut self,
        key: CacheKey,
        record: &DetailRecord,
        accountant: &SizeAccountant,
    ) -> Result<Vec<CacheKey>, PromoteError> {
        let payload = self.codec.encode(record)?;
        let size = payload.len();
        let mut evicted = Vec::new();

        while !accountant.try_reserve(Tier::Promoted, size) {
            match self.entries.pop_lru() {
                Some((victim, entry)) => {
                    accountant.release(Tier::Promoted, entry.size);
                    debug!(key = %victim, freed = entry.size, "evicted tier 3 entry");
                    evicted.push(victim);
                }
                None => {
                    return Err(PromoteError::BudgetExceeded {
                        needed: size,
                        budget: accountant.budget(Tier::Promoted),
                        evicted,
                    });
                }
            }
        }

        if let Some(previous) = self.entries.put(key, CacheEntry::new(payload)) {
            accountant.release(Tier::Promoted, previous.size);
        }

        Ok(evicted)
    }

    /// Look up a record, refreshing its recency and access metadata.
    ///
    /// A payload that fails to decode is dropped on the spot and reported as
    /// a miss.
    pub fn get(&mut self, key: &CacheKey, accountant: &SizeAccountant) -> Option<DetailRecord> {
        let entry = self.entries.get_mut(key)?;

        match self.codec.decode::<DetailRecord>(&entry.payload) {
            Ok(record) => {
                entry.touch();
                Some(record)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "corrupt tier 3 entry, dropping");
                if let Some(entry) = self.entries.pop(key) {
                    accountant.release(Tier::Promoted, entry.size);
                }
                None
            }
        }
    }

    /// Whether a key is resident, without touching its recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    pub fn remove(&mut self, key: &CacheKey, accountant: &SizeAccountant) {
        if let Some(entry) = self.entries.pop(key) {
            accountant.release(Tier::Promoted, entry.size);
        }
    }

    pub fn clear(&mut self, accountant: &SizeAccountant) {
        self.entries.clear();
        accountant.reset(Tier::Promoted, 0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
