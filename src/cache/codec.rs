//! Compression codec for stored records.
//!
//! Both tiers store records as zstd-compressed JSON. Encoding happens on
//! insert, decoding on read; a decode failure is how a corrupt entry
//! announces itself.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("zstd compression failed: {0}")]
    Zstd(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("record deserialization failed: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Encodes records to compressed payloads and back.
#[derive(Debug, Clone, Copy)]
pub struct RecordCodec {
    /// zstd compression level (1-22).
    level: i32,
}

impl RecordCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// Serialize and compress a record.
    pub fn encode<T: Serialize>(&self, record: &T) -> Result<Bytes, CodecError> {
        let raw = serde_json::to_vec(record).map_err(CodecError::Serialize)?;
        let compressed = zstd::encode_all(raw.as_slice(), self.level)?;
        Ok(Bytes::from(compressed))
    }

    /// Decompress and deserialize a payload back into a record.
    pub fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T, CodecError> {
        let raw = zstd::decode_all(payload)?;
        serde_json::from_slice(&raw).map_err(CodecError::Deserialize)
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(3)
    }
}
