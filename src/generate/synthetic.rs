//! A deterministic generator for demos and tests.
//!
//! Real deployments implement [`RecordGenerator`] against their upstream
//! data source; this stub derives stable analysis sections from the key
//! alone, with optional artificial latency and per-category failures.

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::time::sleep;

use crate::cache::record::{AnalysisSection, BasicRecord, CacheKey, DetailRecord};
use crate::generate::{GeneratorError, RecordGenerator};

/// Derives detail records deterministically from the key.
pub struct SyntheticGenerator {
    /// Artificial per-call latency, to exercise deadlines.
    latency: Duration,
    /// Categories for which generation fails, to exercise error paths.
    failing_categories: HashSet<String>,
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            failing_categories: HashSet::new(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_for(mut self, category: impl Into<String>) -> Self {
        self.failing_categories.insert(category.into());
        self
    }

    fn now_epoch() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordGenerator for SyntheticGenerator {
    async fn generate(&self, key: &CacheKey) -> Result<DetailRecord, GeneratorError> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        if self.failing_categories.contains(&key.category) {
            return Err(GeneratorError::Upstream {
                key: key.clone(),
                reason: "synthetic failure".to_string(),
            });
        }

        // Stable pseudo-scores so repeated generations agree.
        let seed = key.id.wrapping_mul(2_654_435_761);
        let score = |salt: u64| ((seed ^ salt) % 1000) as f64 / 1000.0;

        let basic = BasicRecord {
            id: key.id,
            category: key.category.clone(),
            name: format!("{}-{}", key.category, key.id),
            headline: format!("generated profile for {key}"),
            tags: vec!["synthetic".to_string()],
            updated_at: Self::now_epoch(),
        };

        Ok(DetailRecord {
            basic,
            sections: vec![
                AnalysisSection {
                    title: "overview".to_string(),
                    body: format!("aggregate view of {key}"),
                    score: score(0x9e37),
                },
                AnalysisSection {
                    title: "trend".to_string(),
                    body: format!("recent movement for {key}"),
                    score: score(0x85eb),
                },
                AnalysisSection {
                    title: "outlook".to_string(),
                    body: format!("projection for {key}"),
                    score: score(0xc2b2),
                },
            ],
            generated_at: Self::now_epoch(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generation_is_deterministic_in_shape() {
        let generator = SyntheticGenerator::new();
        let key = CacheKey::new("players", 42);

        let first = generator.generate(&key).await.unwrap();
        let second = generator.generate(&key).await.unwrap();

        assert_eq!(first.basic.id, 42);
        assert_eq!(first.sections.len(), 3);
        assert_eq!(
            first.sections.iter().map(|s| s.score).collect::<Vec<_>>(),
            second.sections.iter().map(|s| s.score).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_failing_category_errors() {
        let generator = SyntheticGenerator::new().failing_for("broken");

        let err = generator
            .generate(&CacheKey::new("broken", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Upstream { .. }));

        assert!(generator
            .generate(&CacheKey::new("players", 1))
            .await
            .is_ok());
    }
}
