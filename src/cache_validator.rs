//! Integrity and freshness checks for cached map-data responses.
//!
//! A checksum is computed when a response is cached and checked again when
//! it is read back. A mismatching entry is treated exactly like a miss, so
//! the response is fetched again and the row overwritten.

use crate::models::CacheEntry;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache key for a map-data query: the content hash of the exact query text.
pub fn query_hash(query: &str) -> String {
    sha256_hex(query)
}

impl CacheEntry {
    /// Creates an entry for `payload` with its checksum computed.
    pub fn new(query: &str, payload: String, expires_at: DateTime<Utc>) -> Self {
        let checksum = sha256_hex(&payload);
        Self {
            key: query_hash(query),
            query: query.to_string(),
            payload,
            checksum,
            expires_at,
        }
    }

    /// Returns true if the checksum matches the payload.
    pub fn is_intact(&self) -> bool {
        sha256_hex(&self.payload) == self.checksum
    }

    /// Expired entries are logically absent.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// The payload, if the entry is live and intact.
    pub fn validated_payload(&self, now: DateTime<Utc>) -> Option<&str> {
        if !self.is_live(now) {
            return None;
        }
        if !self.is_intact() {
            // Checksum mismatch - cache poisoned
            tracing::warn!(
                "Cache validation failed for {}: checksum mismatch. Expected: {}, Data length: {}",
                self.key,
                self.checksum,
                self.payload.len()
            );
            return None;
        }
        Some(&self.payload)
    }
}
