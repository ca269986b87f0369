//! Tier 1: the compressed basic record store.
//!
//! Populated once from the bulk loader and read-mostly afterwards. The load
//! is a single linear pass: records are compressed and inserted in the given
//! order until the next record would exceed the tier budget, at which point
//! the remainder is dropped and reported.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use crate::cache::accountant::SizeAccountant;
use crate::cache::codec::{CodecError, RecordCodec};
use crate::cache::record::{BasicRecord, CacheEntry, CacheKey, Tier};

#[derive(Error, Debug)]
pub enum StoreError {
    /// Not even the first record fit — a misconfigured budget, fatal at
    /// startup rather than masked as an empty store.
    #[error("tier 1 budget of {budget} bytes cannot hold a single record ({record_bytes} bytes compressed)")]
    BudgetTooSmall { budget: usize, record_bytes: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Outcome of a [`RecordStore::load_all`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LoadReport {
    /// Records actually inserted.
    pub loaded: usize,
    /// Records dropped once the budget was reached.
    pub dropped: usize,
    /// Compressed bytes now resident.
    pub bytes: usize,
}

impl LoadReport {
    /// True when the input did not fully fit.
    pub fn is_partial(&self) -> bool {
        self.dropped > 0
    }
}

/// Result of a Tier 1 lookup.
#[derive(Debug)]
pub enum StoreRead {
    Hit(BasicRecord),
    Miss,
    /// The stored payload failed to decode. The caller should purge the
    /// entry and treat the lookup as a miss.
    Corrupt,
}

/// The Tier 1 store: compressed basic records keyed by entity.
#[derive(Debug)]
pub struct RecordStore {
    entries: HashMap<CacheKey, CacheEntry>,
    codec: RecordCodec,
}

impl RecordStore {
    pub fn new(codec: RecordCodec) -> Self {
        Self {
            entries: HashMap::new(),
            codec,
        }
    }

    /// Load records in order, stopping at the first one that does not fit.
    ///
    /// Every insert reserves its compressed size through the accountant, so
    /// the budget invariant holds during the load as well as after it. A
    /// partial load is reported, not raised; an empty result from non-empty
    /// input is an error.
    pub fn load_all(
        &mut self,
        records: Vec<BasicRecord>,
        accountant: &SizeAccountant,
    ) -> Result<LoadReport, StoreError> {
        let total = records.len();
        let mut loaded = 0usize;
        let mut bytes = 0usize;
        let mut first_record_bytes = 0usize;

        for record in records {
            let payload = self.codec.encode(&record)?;
            let size = payload.len();
            if loaded == 0 {
                first_record_bytes = size;
            }

            if !accountant.try_reserve(Tier::Basic, size) {
                break;
            }

            let key = record.key();
            if let Some(previous) = self.entries.insert(key, CacheEntry::new(payload)) {
                accountant.release(Tier::Basic, previous.size);
                bytes = bytes.saturating_sub(previous.size);
            }
            loaded += 1;
            bytes += size;
        }

        if loaded == 0 && total > 0 {
            return Err(StoreError::BudgetTooSmall {
                budget: accountant.budget(Tier::Basic),
                record_bytes: first_record_bytes,
            });
        }

        let report = LoadReport {
            loaded,
            dropped: total - loaded,
            bytes,
        };

        if report.is_partial() {
            warn!(
                loaded = report.loaded,
                dropped = report.dropped,
                budget = accountant.budget(Tier::Basic),
                "partial tier 1 load: budget reached"
            );
        }

        Ok(report)
    }

    /// Look up and decompress a record.
    pub fn get(&self, key: &CacheKey) -> StoreRead {
        let Some(entry) = self.entries.get(key) else {
            return StoreRead::Miss;
        };

        match self.codec.decode::<BasicRecord>(&entry.payload) {
            Ok(record) => StoreRead::Hit(record),
            Err(err) => {
                warn!(key = %key, error = %err, "corrupt tier 1 entry");
                StoreRead::Corrupt
            }
        }
    }

    /// Remove an entry and return its bytes to the accountant.
    pub fn purge(&mut self, key: &CacheKey, accountant: &SizeAccountant) {
        if let Some(entry) = self.entries.remove(key) {
            accountant.release(Tier::Basic, entry.size);
        }
    }

    /// Drop every entry, returning the accountant's tier usage to zero.
    pub fn clear(&mut self, accountant: &SizeAccountant) {
        self.entries.clear();
        accountant.reset(Tier::Basic, 0);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compressed bytes currently resident.
    pub fn bytes(&self) -> usize {
        self.entries.values().map(|entry| entry.size).sum()
    }
}
