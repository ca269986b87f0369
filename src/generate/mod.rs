//! Tier 2: on-demand detail generation.
//!
//! The generator is a stateless function from a key to a detailed record. It
//! never caches: every invocation recomputes, and concurrent invocations for
//! the same key are allowed (the coordinator's single-flight layer is what
//! collapses them). Deadline enforcement lives in the coordinator.

pub mod synthetic;

pub use synthetic::SyntheticGenerator;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::record::{CacheKey, DetailRecord};

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("no source material for {0}")]
    UnknownKey(CacheKey),

    #[error("upstream failure while generating {key}: {reason}")]
    Upstream { key: CacheKey, reason: String },
}

/// Builds a detailed record for a key from whatever upstream data it needs.
#[async_trait]
pub trait RecordGenerator: Send + Sync {
    async fn generate(&self, key: &CacheKey) -> Result<DetailRecord, GeneratorError>;
}
