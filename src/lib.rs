//! record-cache-tier: a tiered cache for computed entity records.
//!
//! Serves records under hard per-tier byte budgets:
//!   Tier 1 (compressed basic store, loaded at startup) →
//!   Tier 2 (on-demand generation) →
//!   Tier 3 (bounded LRU promotion cache for popular detailed records)
//!
//! Exposes a small HTTP API for lookups, stats, and administration.

pub mod cache;
pub mod config;
pub mod generate;
pub mod loader;
pub mod server;
