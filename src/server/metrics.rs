//! Prometheus exposition of cache statistics.
//!
//! Gauges are synchronized from a [`CacheStats`] snapshot on each scrape;
//! the coordinator's atomic counters remain the source of truth.

use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

use crate::cache::coordinator::CacheStats;

/// Registry and gauges for the `/metrics` endpoint.
pub struct CacheMetrics {
    registry: Registry,

    tier1_bytes: IntGauge,
    tier1_entries: IntGauge,
    tier1_hits: IntGauge,
    tier1_misses: IntGauge,

    tier3_bytes: IntGauge,
    tier3_entries: IntGauge,
    tier3_hits: IntGauge,
    tier3_misses: IntGauge,

    requests_total: IntGauge,
    generations_total: IntGauge,
    generation_failures_total: IntGauge,
    promotions_total: IntGauge,
    evictions_total: IntGauge,
    promotion_rejections_total: IntGauge,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntGauge> {
    let gauge = IntGauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl CacheMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        Ok(Self {
            tier1_bytes: gauge(
                &registry,
                "record_cache_tier1_bytes",
                "Compressed bytes resident in the tier 1 basic store",
            )?,
            tier1_entries: gauge(
                &registry,
                "record_cache_tier1_entries",
                "Records resident in the tier 1 basic store",
            )?,
            tier1_hits: gauge(
                &registry,
                "record_cache_tier1_hits",
                "Tier 1 lookup hits",
            )?,
            tier1_misses: gauge(
                &registry,
                "record_cache_tier1_misses",
                "Tier 1 lookup misses",
            )?,
            tier3_bytes: gauge(
                &registry,
                "record_cache_tier3_bytes",
                "Compressed bytes resident in the tier 3 promotion cache",
            )?,
            tier3_entries: gauge(
                &registry,
                "record_cache_tier3_entries",
                "Records resident in the tier 3 promotion cache",
            )?,
            tier3_hits: gauge(
                &registry,
                "record_cache_tier3_hits",
                "Tier 3 lookup hits",
            )?,
            tier3_misses: gauge(
                &registry,
                "record_cache_tier3_misses",
                "Tier 3 lookup misses",
            )?,
            requests_total: gauge(
                &registry,
                "record_cache_requests_total",
                "Total lookups served",
            )?,
            generations_total: gauge(
                &registry,
                "record_cache_generations_total",
                "Successful on-demand generations",
            )?,
            generation_failures_total: gauge(
                &registry,
                "record_cache_generation_failures_total",
                "Failed or timed-out generations",
            )?,
            promotions_total: gauge(
                &registry,
                "record_cache_promotions_total",
                "Records promoted into tier 3",
            )?,
            evictions_total: gauge(
                &registry,
                "record_cache_evictions_total",
                "Records evicted from tier 3",
            )?,
            promotion_rejections_total: gauge(
                &registry,
                "record_cache_promotion_rejections_total",
                "Promotions rejected for exceeding the tier 3 budget",
            )?,
            registry,
        })
    }

    /// Push a stats snapshot into the gauges.
    pub fn update(&self, stats: &CacheStats) {
        self.tier1_bytes.set(stats.tier1_bytes as i64);
        self.tier1_entries.set(stats.tier1_count as i64);
        self.tier1_hits.set(stats.tier1_hits as i64);
        self.tier1_misses.set(stats.tier1_misses as i64);

        self.tier3_bytes.set(stats.tier3_bytes as i64);
        self.tier3_entries.set(stats.tier3_count as i64);
        self.tier3_hits.set(stats.tier3_hits as i64);
        self.tier3_misses.set(stats.tier3_misses as i64);

        self.requests_total.set(stats.total_requests as i64);
        self.generations_total.set(stats.generations as i64);
        self.generation_failures_total
            .set(stats.generation_failures as i64);
        self.promotions_total.set(stats.promotions as i64);
        self.evictions_total.set(stats.evictions as i64);
        self.promotion_rejections_total
            .set(stats.promotion_rejections as i64);
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
