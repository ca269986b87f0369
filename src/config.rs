//! Runtime configuration for record-cache-tier.
//!
//! Configuration can be loaded from a JSON file or constructed
//! programmatically. All cache knobs (tier budgets, promotion threshold and
//! cooldown, generation timeout, compression level) live here.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "record-cache-tier", about = "Tiered record cache server")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Path to the seed file of basic records (JSON lines).
    #[arg(short, long, default_value = "seed.jsonl")]
    pub seed: PathBuf,

    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Cache tier configuration.
    pub cache: CacheConfig,

    /// Compression settings.
    pub compression: CompressionConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Tier budgets and promotion policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Tier 1 budget for compressed basic records, in bytes.
    pub tier1_budget_bytes: usize,

    /// Tier 3 budget for compressed detail records, in bytes.
    pub tier3_budget_bytes: usize,

    /// Generations of a key before it is promoted into tier 3.
    pub promotion_threshold: u64,

    /// Cooldown after a rejected promotion, in seconds.
    pub promotion_cooldown_secs: u64,

    /// Default deadline for a single generation, in seconds.
    pub generation_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tier1_budget_bytes: 64 * 1024 * 1024,  // 64 MB
            tier3_budget_bytes: 256 * 1024 * 1024, // 256 MB
            promotion_threshold: 3,
            promotion_cooldown_secs: 60,
            generation_timeout_secs: 10,
        }
    }
}

impl CacheConfig {
    pub fn promotion_cooldown(&self) -> Duration {
        Duration::from_secs(self.promotion_cooldown_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

/// Compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// zstd compression level (1-22).
    pub zstd_level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { zstd_level: 3 }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Reject configurations that can never serve anything.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.tier1_budget_bytes == 0 {
            anyhow::bail!("tier1_budget_bytes must be non-zero");
        }
        if self.cache.promotion_threshold == 0 {
            anyhow::bail!("promotion_threshold must be at least 1");
        }
        if !(1..=22).contains(&self.compression.zstd_level) {
            anyhow::bail!(
                "zstd_level {} out of range (1-22)",
                self.compression.zstd_level
            );
        }
        Ok(())
    }
}
