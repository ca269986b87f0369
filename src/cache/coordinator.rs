//! The cache coordinator: the external contract over all three tiers.
//!
//! A lookup at Basic level goes to the Tier 1 store only. A lookup at
//! Detailed level tries the Tier 3 promotion cache, then generates under the
//! caller's deadline, records popularity, and promotes once the threshold is
//! crossed. The generator is never invoked while a tier lock is held, so
//! slow generation cannot stall unrelated readers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::accountant::SizeAccountant;
use crate::cache::codec::RecordCodec;
use crate::cache::flight::{Flight, FlightGroup, FlightOutcome};
use crate::cache::popularity::PopularityTracker;
use crate::cache::promoted::{PromoteError, PromotionCache};
use crate::cache::record::{BasicRecord, CacheKey, DetailLevel, DetailRecord, Record, Tier};
use crate::cache::store::{LoadReport, RecordStore, StoreError, StoreRead};
use crate::config::Config;
use crate::generate::RecordGenerator;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent in the tier looked up. The normal outcome for a Basic
    /// lookup of an unloaded key; never raised for Detailed lookups, which
    /// fall through to generation.
    #[error("record not found: {0}")]
    NotFound(CacheKey),

    #[error("generation failed for {key}: {reason}")]
    GenerationFailed { key: CacheKey, reason: String },

    #[error("generation timed out for {0}")]
    GenerationTimeout(CacheKey),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A successful lookup: the record plus the tier that served it.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub record: Record,
    pub tier: Tier,
}

/// Which tier(s) an administrative clear applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    Basic,
    Promoted,
    All,
}

impl std::str::FromStr for ClearTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ClearTarget::Basic),
            "promoted" => Ok(ClearTarget::Promoted),
            "all" => Ok(ClearTarget::All),
            other => Err(format!("unknown clear target: {other}")),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    tier1_hits: AtomicU64,
    tier1_misses: AtomicU64,
    tier3_hits: AtomicU64,
    tier3_misses: AtomicU64,
    generations: AtomicU64,
    generation_failures: AtomicU64,
    promotions: AtomicU64,
    evictions: AtomicU64,
    promotion_rejections: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.tier1_hits.store(0, Ordering::Relaxed);
        self.tier1_misses.store(0, Ordering::Relaxed);
        self.tier3_hits.store(0, Ordering::Relaxed);
        self.tier3_misses.store(0, Ordering::Relaxed);
        self.generations.store(0, Ordering::Relaxed);
        self.generation_failures.store(0, Ordering::Relaxed);
        self.promotions.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.promotion_rejections.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub tier1_bytes: usize,
    pub tier1_budget: usize,
    pub tier1_count: usize,
    pub tier1_hits: u64,
    pub tier1_misses: u64,
    pub tier1_hit_rate: f64,

    pub tier3_bytes: usize,
    pub tier3_budget: usize,
    pub tier3_count: usize,
    pub tier3_hits: u64,
    pub tier3_misses: u64,
    pub tier3_hit_rate: f64,

    pub total_requests: u64,
    pub generations: u64,
    pub generation_failures: u64,
    pub promotions: u64,
    pub evictions: u64,
    pub promotion_rejections: u64,
    pub tracked_keys: usize,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64
}

/// Orchestrates the tiered cache.
pub struct CacheCoordinator {
    basic: RwLock<RecordStore>,
    promoted: Mutex<PromotionCache>,
    popularity: Mutex<PopularityTracker>,
    accountant: SizeAccountant,
    generator: Arc<dyn RecordGenerator>,
    flights: FlightGroup,
    codec: RecordCodec,
    counters: Counters,
    config: Arc<Config>,
}

impl CacheCoordinator {
    pub fn new(config: Arc<Config>, generator: Arc<dyn RecordGenerator>) -> Self {
        let codec = RecordCodec::new(config.compression.zstd_level);
        let accountant = SizeAccountant::new(
            config.cache.tier1_budget_bytes,
            config.cache.tier3_budget_bytes,
        );
        let popularity = PopularityTracker::new(
            config.cache.promotion_threshold,
            config.cache.promotion_cooldown(),
        );

        Self {
            basic: RwLock::new(RecordStore::new(codec)),
            promoted: Mutex::new(PromotionCache::new(codec)),
            popularity: Mutex::new(popularity),
            accountant,
            generator,
            flights: FlightGroup::new(),
            codec,
            counters: Counters::default(),
            config,
        }
    }

    /// Populate Tier 1 from the bulk loader's ordered record list.
    pub async fn load(&self, records: Vec<BasicRecord>) -> Result<LoadReport, CacheError> {
        let mut store = self.basic.write().await;
        let report = store.load_all(records, &self.accountant)?;
        info!(
            loaded = report.loaded,
            dropped = report.dropped,
            bytes = report.bytes,
            "tier 1 loaded"
        );
        Ok(report)
    }

    /// Look up a record at the requested detail level.
    ///
    /// `deadline` bounds the generation wait for Detailed lookups; `None`
    /// falls back to the configured generation timeout.
    pub async fn get(
        &self,
        key: &CacheKey,
        level: DetailLevel,
        deadline: Option<Duration>,
    ) -> Result<Lookup, CacheError> {
        Counters::bump(&self.counters.total_requests);

        match level {
            DetailLevel::Basic => self.get_basic(key).await,
            DetailLevel::Detailed => self.get_detailed(key, deadline).await,
        }
    }

    async fn get_basic(&self, key: &CacheKey) -> Result<Lookup, CacheError> {
        let read = self.basic.read().await.get(key);

        match read {
            StoreRead::Hit(record) => {
                Counters::bump(&self.counters.tier1_hits);
                Ok(Lookup {
                    record: Record::Basic(record),
                    tier: Tier::Basic,
                })
            }
            StoreRead::Miss => {
                Counters::bump(&self.counters.tier1_misses);
                Err(CacheError::NotFound(key.clone()))
            }
            StoreRead::Corrupt => {
                // Recovered locally: the entry is dropped from store and
                // accounting, and the caller sees an ordinary miss.
                Counters::bump(&self.counters.tier1_misses);
                self.basic.write().await.purge(key, &self.accountant);
                Err(CacheError::NotFound(key.clone()))
            }
        }
    }

    async fn get_detailed(
        &self,
        key: &CacheKey,
        deadline: Option<Duration>,
    ) -> Result<Lookup, CacheError> {
        {
            let mut promoted = self.promoted.lock().await;
            if let Some(record) = promoted.get(key, &self.accountant) {
                Counters::bump(&self.counters.tier3_hits);
                return Ok(Lookup {
                    record: Record::Detailed(record),
                    tier: Tier::Promoted,
                });
            }
        }
        Counters::bump(&self.counters.tier3_misses);

        let wait = deadline.unwrap_or_else(|| self.config.cache.generation_timeout());
        let record = self.generate(key, wait).await?;

        let eligible = {
            let mut tracker = self.popularity.lock().await;
            tracker.record_access(key);
            tracker.should_promote(key)
        };
        if eligible {
            self.try_promote(key, &record).await;
        }

        Ok(Lookup {
            record: Record::Detailed(record),
            tier: Tier::Generated,
        })
    }

    /// Run or join the generation flight for a key.
    async fn generate(&self, key: &CacheKey, wait: Duration) -> Result<DetailRecord, CacheError> {
        let started = Instant::now();

        match self.flights.join(key) {
            Flight::Leader(lease) => match self.run_generation(key, wait).await {
                Ok(record) => {
                    lease.complete(FlightOutcome::Success(record.clone()));
                    Ok(record)
                }
                Err(err) => {
                    let outcome = match &err {
                        CacheError::GenerationTimeout(_) => FlightOutcome::TimedOut,
                        CacheError::GenerationFailed { reason, .. } => {
                            FlightOutcome::Failed(reason.clone())
                        }
                        other => FlightOutcome::Failed(other.to_string()),
                    };
                    lease.complete(outcome);
                    Err(err)
                }
            },
            Flight::Follower(slot) => {
                let outcome = match timeout(wait, FlightGroup::wait(slot)).await {
                    Ok(outcome) => outcome,
                    Err(_) => return Err(CacheError::GenerationTimeout(key.clone())),
                };
                match outcome {
                    FlightOutcome::Success(record) => Ok(record),
                    FlightOutcome::Failed(reason) => Err(CacheError::GenerationFailed {
                        key: key.clone(),
                        reason,
                    }),
                    FlightOutcome::TimedOut => Err(CacheError::GenerationTimeout(key.clone())),
                    FlightOutcome::Aborted => {
                        // The leader went away without an outcome. Generate
                        // independently with whatever deadline remains.
                        debug!(key = %key, "generation flight aborted, falling back");
                        let remaining = wait.saturating_sub(started.elapsed());
                        if remaining.is_zero() {
                            return Err(CacheError::GenerationTimeout(key.clone()));
                        }
                        self.run_generation(key, remaining).await
                    }
                }
            }
        }
    }

    async fn run_generation(
        &self,
        key: &CacheKey,
        wait: Duration,
    ) -> Result<DetailRecord, CacheError> {
        match timeout(wait, self.generator.generate(key)).await {
            Ok(Ok(record)) => {
                Counters::bump(&self.counters.generations);
                Ok(record)
            }
            Ok(Err(err)) => {
                Counters::bump(&self.counters.generation_failures);
                Err(CacheError::GenerationFailed {
                    key: key.clone(),
                    reason: err.to_string(),
                })
            }
            Err(_elapsed) => {
                Counters::bump(&self.counters.generation_failures);
                Err(CacheError::GenerationTimeout(key.clone()))
            }
        }
    }

    /// Attempt to move a generated record into Tier 3.
    ///
    /// A budget rejection is absorbed here: the caller already has the
    /// record, and the key enters its cooldown window so sustained pressure
    /// does not trigger futile attempts on every request.
    async fn try_promote(&self, key: &CacheKey, record: &DetailRecord) {
        let rejected = {
            let mut promoted = self.promoted.lock().await;
            if promoted.contains(key) {
                return;
            }
            match promoted.insert(key.clone(), record, &self.accountant) {
                Ok(evicted) => {
                    Counters::bump(&self.counters.promotions);
                    self.counters
                        .evictions
                        .fetch_add(evicted.len() as u64, Ordering::Relaxed);
                    debug!(key = %key, evicted = evicted.len(), "promoted into tier 3");
                    false
                }
                Err(PromoteError::BudgetExceeded { needed, evicted, .. }) => {
                    Counters::bump(&self.counters.promotion_rejections);
                    self.counters
                        .evictions
                        .fetch_add(evicted.len() as u64, Ordering::Relaxed);
                    warn!(key = %key, needed, "promotion rejected: over budget");
                    true
                }
                Err(PromoteError::Codec(err)) => {
                    warn!(key = %key, error = %err, "promotion skipped: encode failed");
                    false
                }
            }
        };

        if rejected {
            self.popularity.lock().await.start_cooldown(key);
        }
    }

    /// Build a fresh Tier 1 store from `records` and swap it in atomically.
    ///
    /// The replacement loads against a staging accountant so readers of the
    /// live store are unaffected until the swap; the shared accountant is
    /// re-based in the same critical section.
    pub async fn reload(&self, records: Vec<BasicRecord>) -> Result<LoadReport, CacheError> {
        let staging = SizeAccountant::new(self.accountant.budget(Tier::Basic), 0);
        let mut fresh = RecordStore::new(self.codec);
        let report = fresh.load_all(records, &staging)?;

        {
            let mut store = self.basic.write().await;
            *store = fresh;
            self.accountant.reset(Tier::Basic, report.bytes);
        }

        info!(
            loaded = report.loaded,
            dropped = report.dropped,
            bytes = report.bytes,
            "tier 1 reloaded"
        );
        Ok(report)
    }

    /// Administrative clear of one or all tiers.
    pub async fn clear(&self, target: ClearTarget) {
        match target {
            ClearTarget::Basic => {
                self.basic.write().await.clear(&self.accountant);
            }
            ClearTarget::Promoted => {
                self.promoted.lock().await.clear(&self.accountant);
                self.popularity.lock().await.reset();
            }
            ClearTarget::All => {
                self.basic.write().await.clear(&self.accountant);
                self.promoted.lock().await.clear(&self.accountant);
                self.popularity.lock().await.reset();
                self.counters.reset();
            }
        }
        info!(?target, "cache cleared");
    }

    /// Snapshot the cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let tier1_count = self.basic.read().await.len();
        let tier3_count = self.promoted.lock().await.len();
        let tracked_keys = self.popularity.lock().await.tracked_keys();

        let tier1_hits = self.counters.tier1_hits.load(Ordering::Relaxed);
        let tier1_misses = self.counters.tier1_misses.load(Ordering::Relaxed);
        let tier3_hits = self.counters.tier3_hits.load(Ordering::Relaxed);
        let tier3_misses = self.counters.tier3_misses.load(Ordering::Relaxed);

        CacheStats {
            tier1_bytes: self.accountant.usage(Tier::Basic),
            tier1_budget: self.accountant.budget(Tier::Basic),
            tier1_count,
            tier1_hits,
            tier1_misses,
            tier1_hit_rate: hit_rate(tier1_hits, tier1_misses),

            tier3_bytes: self.accountant.usage(Tier::Promoted),
            tier3_budget: self.accountant.budget(Tier::Promoted),
            tier3_count,
            tier3_hits,
            tier3_misses,
            tier3_hit_rate: hit_rate(tier3_hits, tier3_misses),

            total_requests: self.counters.total_requests.load(Ordering::Relaxed),
            generations: self.counters.generations.load(Ordering::Relaxed),
            generation_failures: self.counters.generation_failures.load(Ordering::Relaxed),
            promotions: self.counters.promotions.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            promotion_rejections: self
                .counters
                .promotion_rejections
                .load(Ordering::Relaxed),
            tracked_keys,
        }
    }

    /// Whether a key is currently resident in Tier 3. Used by tests and the
    /// admin surface; does not touch recency.
    pub async fn is_promoted(&self, key: &CacheKey) -> bool {
        self.promoted.lock().await.contains(key)
    }
}
