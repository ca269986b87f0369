//! Record types and cache entry metadata.
//!
//! Records are the unit of caching. A basic record is a small, bounded
//! composite stored compressed in the Tier 1 store; a detailed record adds
//! generated analysis sections and lives in the Tier 3 promotion cache once
//! its key becomes popular enough.

use std::str::FromStr;
use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Identifies which tier served a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Tier 1: compressed basic store, populated at load time.
    Basic,
    /// Tier 2: the record was generated on demand for this call.
    Generated,
    /// Tier 3: bounded promotion cache of detailed records.
    Promoted,
}

impl Tier {
    /// Returns the numeric tier level (lower = cheaper to serve).
    pub fn level(&self) -> u8 {
        match self {
            Tier::Basic => 1,
            Tier::Generated => 2,
            Tier::Promoted => 3,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Basic => write!(f, "basic-store"),
            Tier::Generated => write!(f, "generated"),
            Tier::Promoted => write!(f, "promoted"),
        }
    }
}

/// Requested level of detail for a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Basic,
    Detailed,
}

impl FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(DetailLevel::Basic),
            "detailed" => Ok(DetailLevel::Detailed),
            other => Err(format!("unknown detail level: {other}")),
        }
    }
}

/// Composite key identifying an entity: category plus numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub category: String,
    pub id: u64,
}

impl CacheKey {
    pub fn new(category: impl Into<String>, id: u64) -> Self {
        Self {
            category: category.into(),
            id,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.id)
    }
}

/// A small composite record with a bounded field set.
///
/// Basic records are supplied by the bulk loader at startup and are immutable
/// until a full reload swaps the whole store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicRecord {
    pub id: u64,
    pub category: String,
    pub name: String,
    pub headline: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Epoch seconds of the last upstream refresh.
    pub updated_at: u64,
}

impl BasicRecord {
    /// The key this record is stored under.
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.category.clone(), self.id)
    }
}

/// One analysis section of a detailed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub title: String,
    pub body: String,
    pub score: f64,
}

/// The larger record produced by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    #[serde(flatten)]
    pub basic: BasicRecord,
    pub sections: Vec<AnalysisSection>,
    /// Epoch seconds at which this record was generated.
    pub generated_at: u64,
}

/// What a lookup returns: one record at the requested detail level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Basic(BasicRecord),
    Detailed(DetailRecord),
}

/// A stored entry: compressed payload plus bookkeeping metadata.
///
/// `last_access` drives LRU ordering in the promotion cache; `size` is the
/// compressed payload length and is what the accountant charges against the
/// tier budget.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Bytes,
    pub size: usize,
    pub inserted_at: Instant,
    pub last_access: Instant,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn new(payload: Bytes) -> Self {
        let size = payload.len();
        let now = Instant::now();
        Self {
            payload,
            size,
            inserted_at: now,
            last_access: now,
            access_count: 0,
        }
    }

    /// Record an access, updating timestamp and counter.
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
        self.access_count += 1;
    }
}
