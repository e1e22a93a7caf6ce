//! Persisted cache entry and result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Lifetime of an entry written without an explicit TTL.
pub const DEFAULT_TTL_MS: u64 = 10_000;

/// One cached API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
  /// Response body, stored as received
  pub data: Value,
  /// Epoch milliseconds of the write
  pub stored_at: i64,
  /// Milliseconds the entry stays valid after `stored_at`
  pub ttl: u64,
}

impl CacheEntry {
  /// Valid while `now - stored_at <= ttl`.
  pub fn is_valid_at(&self, now: i64) -> bool {
    let ttl = i64::try_from(self.ttl).unwrap_or(i64::MAX);
    now.saturating_sub(self.stored_at) <= ttl
  }
}

/// The single document holding every entry, keyed by cache key.
pub type CacheContainer = BTreeMap<String, CacheEntry>;

/// Aggregate counts over the container at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
  pub total: usize,
  pub valid: usize,
  pub expired: usize,
  /// Serialized length of the whole container
  pub size_bytes: usize,
}

/// Result of a cache-first fetch, with where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }

  pub fn is_cached(&self) -> bool {
    self.source == CacheSource::Cache
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the API on this call
  Network,
  /// Served from a still-valid entry
  Cache,
}
