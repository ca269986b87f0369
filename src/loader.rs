//! Bulk loading of basic records.
//!
//! The bulk loader supplies the ordered record list that populates Tier 1 at
//! process start (and on an admin reload). The order matters: the store's
//! single-pass budgeted load keeps the head of the list and drops the tail.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::cache::record::BasicRecord;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("seed file not found: {0}")]
    FileNotFound(String),

    #[error("malformed seed record on line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the ordered basic record set for Tier 1.
#[async_trait]
pub trait BulkLoader: Send + Sync {
    async fn load(&self) -> Result<Vec<BasicRecord>, LoaderError>;
}

/// Reads basic records from a JSON-lines file, one record per line.
///
/// Blank lines are skipped; a malformed line aborts the load rather than
/// silently shifting the budget onto later records.
pub struct JsonSeedLoader {
    path: PathBuf,
}

impl JsonSeedLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BulkLoader for JsonSeedLoader {
    async fn load(&self) -> Result<Vec<BasicRecord>, LoaderError> {
        if !self.path.exists() {
            return Err(LoaderError::FileNotFound(self.path.display().to_string()));
        }

        let data = fs::read_to_string(&self.path).await?;
        let mut records = Vec::new();

        for (index, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: BasicRecord =
                serde_json::from_str(line).map_err(|source| LoaderError::MalformedRecord {
                    line: index + 1,
                    source,
                })?;
            records.push(record);
        }

        info!(
            path = %self.path.display(),
            records = records.len(),
            "seed file loaded"
        );
        Ok(records)
    }
}
