//! API response cache with per-entry TTL and lazy expiry.

use color_eyre::Result;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, error, info};

use crate::store::{PersistentStore, StorageBackend, StorageKey};

use super::clock::{Clock, SystemClock};
use super::entry::{CacheContainer, CacheEntry, CacheResult, CacheStats, DEFAULT_TTL_MS};
use super::key::{self, fingerprint, Parameters};

/// Response cache over one [`PersistentStore`] slot.
///
/// Every entry lives in a single JSON document. Each mutation reads the
/// latest document, changes it and writes it back whole. Within a process
/// that is safe because operations are synchronous; two processes sharing
/// the same storage can still overwrite each other's changes (last write
/// wins on the whole document).
///
/// Storage failures never surface as errors: a cache that cannot persist
/// behaves as if it were empty.
pub struct ResponseCache<B: ?Sized, C = SystemClock> {
  store: PersistentStore<B>,
  clock: C,
  /// TTL applied when `set` gets no explicit one
  default_ttl_ms: u64,
}

impl<B: StorageBackend + ?Sized> ResponseCache<B, SystemClock> {
  pub fn new(store: PersistentStore<B>) -> Self {
    Self {
      store,
      clock: SystemClock,
      default_ttl_ms: DEFAULT_TTL_MS,
    }
  }
}

impl<B: StorageBackend + ?Sized, C: Clock> ResponseCache<B, C> {
  /// Replace the time source.
  #[cfg(test)]
  pub fn with_clock<C2: Clock>(self, clock: C2) -> ResponseCache<B, C2> {
    ResponseCache {
      store: self.store,
      clock,
      default_ttl_ms: self.default_ttl_ms,
    }
  }

  pub fn with_default_ttl(mut self, ttl_ms: u64) -> Self {
    self.default_ttl_ms = ttl_ms;
    self
  }

  /// Cache key for a request. Pure; see [`key::generate_key`].
  pub fn generate_key(endpoint: &str, parameters: &Parameters) -> String {
    key::generate_key(endpoint, parameters)
  }

  fn load(&self) -> CacheContainer {
    self.store.get(StorageKey::Cache.as_str(), CacheContainer::new())
  }

  fn save(&self, container: &CacheContainer) -> bool {
    self.store.set(StorageKey::Cache.as_str(), container)
  }

  /// Look up a valid entry.
  ///
  /// An expired entry is deleted and reported as a miss. The miss stands
  /// even if persisting the deletion fails.
  pub fn get(&self, key: &str) -> Option<Value> {
    let mut container = self.load();
    let now = self.clock.now_millis();

    let valid = container.get(key)?.is_valid_at(now);
    if valid {
      debug!(key = %fingerprint(key), "Cache hit");
      // Taken from the local copy only; nothing is written back
      return container.remove(key).map(|entry| entry.data);
    }

    debug!(key = %fingerprint(key), "Cache entry expired, removing");
    container.remove(key);
    if !self.save(&container) {
      debug!(key = %fingerprint(key), "Could not persist expired entry removal");
    }
    None
  }

  /// Store `data` under `key`, stamped with the current time.
  ///
  /// `custom_ttl_ms` overrides the default TTL for this entry only.
  /// Returns `false` if the data cannot be serialized or persisted; the
  /// stored document is then left as it was.
  pub fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, custom_ttl_ms: Option<u64>) -> bool {
    let data = match serde_json::to_value(data) {
      Ok(data) => data,
      Err(e) => {
        error!(key = %fingerprint(key), error = %e, "Error serializing cache data");
        return false;
      }
    };

    let mut container = self.load();
    container.insert(
      key.to_string(),
      CacheEntry {
        data,
        stored_at: self.clock.now_millis(),
        ttl: custom_ttl_ms.unwrap_or(self.default_ttl_ms),
      },
    );
    self.save(&container)
  }

  pub fn remove(&self, key: &str) -> bool {
    let mut container = self.load();
    container.remove(key);
    self.save(&container)
  }

  /// Drop every entry.
  pub fn clear(&self) -> bool {
    self.save(&CacheContainer::new())
  }

  /// Delete every expired entry and return how many were removed.
  pub fn clean_expired(&self) -> usize {
    let mut container = self.load();
    let now = self.clock.now_millis();
    let before = container.len();

    container.retain(|_, entry| entry.is_valid_at(now));
    let removed = before - container.len();

    self.save(&container);
    if removed > 0 {
      info!(removed, "Removed expired cache entries");
    }
    removed
  }

  /// Counts over the stored document. Does not modify it.
  pub fn stats(&self) -> CacheStats {
    let container = self.load();
    let now = self.clock.now_millis();

    let valid = container
      .values()
      .filter(|entry| entry.is_valid_at(now))
      .count();
    let size_bytes = serde_json::to_string(&container)
      .map(|s| s.len())
      .unwrap_or(0);

    CacheStats {
      total: container.len(),
      valid,
      expired: container.len() - valid,
      size_bytes,
    }
  }

  /// Cache-first fetch.
  ///
  /// 1. Return a valid entry if there is one
  /// 2. Otherwise run `fetcher`, store its result, and return it
  ///
  /// A fetch error is returned as-is and nothing is stored.
  pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<Value>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value>>,
  {
    if let Some(data) = self.get(key) {
      return Ok(CacheResult::from_cache(data));
    }

    let data = fetcher().await?;
    self.set(key, &data, None);
    Ok(CacheResult::from_network(data))
  }
}

impl<B: ?Sized, C: Clone> Clone for ResponseCache<B, C> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      clock: self.clock.clone(),
      default_ttl_ms: self.default_ttl_ms,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use crate::store::{MemoryBackend, UnavailableBackend};
  use color_eyre::eyre::eyre;
  use serde_json::json;
  use std::sync::Arc;

  const START: i64 = 1_700_000_000_000;

  fn params(value: Value) -> Parameters {
    match value {
      Value::Object(map) => map,
      _ => panic!("parameters must be an object"),
    }
  }

  fn cache_with_clock() -> (
    ResponseCache<MemoryBackend, Arc<ManualClock>>,
    Arc<MemoryBackend>,
    Arc<ManualClock>,
  ) {
    let backend = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::new(START));
    let cache = ResponseCache::new(PersistentStore::new(Arc::clone(&backend)))
      .with_clock(Arc::clone(&clock));
    (cache, backend, clock)
  }

  #[test]
  fn test_round_trip() {
    let (cache, _, _) = cache_with_clock();
    let key = ResponseCache::<MemoryBackend>::generate_key(
      "/translate",
      &params(json!({ "text": "Hola", "source_lang": "es", "target_lang": "en" })),
    );
    let data = json!({ "translated_text": "Hello", "confidence": [0.5, 0.25] });

    assert!(cache.set(&key, &data, None));
    assert_eq!(cache.get(&key), Some(data));
  }

  #[test]
  fn test_miss_on_unknown_key() {
    let (cache, _, _) = cache_with_clock();
    assert_eq!(cache.get("nothing"), None);
  }

  #[test]
  fn test_analyze_scenario() {
    let (cache, _, _) = cache_with_clock();
    let key = ResponseCache::<MemoryBackend>::generate_key(
      "/analyze",
      &params(json!({ "text": "Hello", "compact_mode": false })),
    );

    cache.set(&key, &json!({ "sentiment": { "label": "positive" } }), None);

    assert_eq!(
      cache.get(&key),
      Some(json!({ "sentiment": { "label": "positive" } }))
    );
    let stats = cache.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.valid, 1);
    assert_eq!(stats.expired, 0);
  }

  #[test]
  fn test_expiration_boundary() {
    let (cache, _, clock) = cache_with_clock();
    cache.set("k", &json!("v"), Some(1_000));

    clock.advance(999);
    assert_eq!(cache.get("k"), Some(json!("v")));

    clock.advance(2);
    assert_eq!(cache.get("k"), None);
    assert_eq!(cache.stats().total, 0);
  }

  #[test]
  fn test_default_ttl_applies() {
    let (cache, _, clock) = cache_with_clock();
    cache.set("k", &json!(1), None);

    clock.advance(DEFAULT_TTL_MS as i64);
    assert_eq!(cache.get("k"), Some(json!(1)));

    clock.advance(1);
    assert_eq!(cache.get("k"), None);
  }

  #[test]
  fn test_configured_default_ttl() {
    let (cache, _, clock) = cache_with_clock();
    let cache = cache.with_default_ttl(50);
    cache.set("k", &json!(1), None);

    clock.advance(51);
    assert_eq!(cache.get("k"), None);
  }

  #[test]
  fn test_ttl_is_absolute_not_sliding() {
    let (cache, _, clock) = cache_with_clock();
    cache.set("k", &json!(1), Some(100));

    clock.advance(60);
    assert!(cache.get("k").is_some());
    clock.advance(60);
    assert!(cache.get("k").is_none());
  }

  #[test]
  fn test_overwrite_restamps_entry() {
    let (cache, _, clock) = cache_with_clock();
    cache.set("k", &json!("old"), Some(100));

    clock.advance(80);
    cache.set("k", &json!("new"), Some(100));

    clock.advance(80);
    assert_eq!(cache.get("k"), Some(json!("new")));
  }

  #[test]
  fn test_get_does_not_disturb_other_entries() {
    let (cache, _, clock) = cache_with_clock();
    cache.set("short", &json!(1), Some(10));
    cache.set("long", &json!(2), Some(1_000));

    clock.advance(20);
    assert_eq!(cache.get("short"), None);

    let stats = cache.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(cache.get("long"), Some(json!(2)));
  }

  #[test]
  fn test_stats_does_not_prune() {
    let (cache, _, clock) = cache_with_clock();
    cache.set("a", &json!(1), Some(10));
    cache.set("b", &json!(2), Some(1_000));

    clock.advance(20);
    let stats = cache.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.valid, 1);
    assert_eq!(stats.expired, 1);

    // Still there on a second look
    assert_eq!(cache.stats().total, 2);
  }

  #[test]
  fn test_stats_size_matches_stored_document() {
    let (cache, backend, _) = cache_with_clock();
    cache.set("a", &json!({ "x": 1 }), None);

    let raw = backend
      .get_item(StorageKey::Cache.as_str())
      .unwrap()
      .unwrap();
    assert_eq!(cache.stats().size_bytes, raw.len());
  }

  #[test]
  fn test_clean_expired_selectivity() {
    let (cache, _, clock) = cache_with_clock();
    for key in ["v1", "v2", "v3"] {
      cache.set(key, &json!(key), Some(10_000));
    }
    for key in ["e1", "e2"] {
      cache.set(key, &json!(key), Some(100));
    }

    clock.advance(500);
    assert_eq!(cache.clean_expired(), 2);

    let stats = cache.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.expired, 0);
  }

  #[test]
  fn test_clean_expired_on_empty_cache() {
    let (cache, _, _) = cache_with_clock();
    assert_eq!(cache.clean_expired(), 0);
  }

  #[test]
  fn test_remove_and_clear() {
    let (cache, _, _) = cache_with_clock();
    cache.set("a", &json!(1), None);
    cache.set("b", &json!(2), None);

    assert!(cache.remove("a"));
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(json!(2)));

    // Removing a missing key still succeeds
    assert!(cache.remove("a"));

    assert!(cache.clear());
    assert_eq!(cache.stats().total, 0);
  }

  #[test]
  fn test_failing_writes_degrade_to_miss() {
    let (cache, backend, _) = cache_with_clock();
    backend.fail_writes(true);

    assert!(!cache.set("k", &json!({ "a": 1 }), None));
    assert_eq!(cache.get("k"), None);
  }

  #[test]
  fn test_expired_miss_survives_failed_prune() {
    let (cache, backend, clock) = cache_with_clock();
    cache.set("k", &json!(1), Some(10));

    backend.fail_writes(true);
    clock.advance(11);

    assert_eq!(cache.get("k"), None);
    // The prune could not be persisted, so the stale entry is still stored
    assert_eq!(cache.stats().total, 1);
    assert_eq!(cache.stats().expired, 1);
  }

  #[test]
  fn test_unavailable_storage_behaves_like_disabled_cache() {
    let cache = ResponseCache::new(PersistentStore::new(Arc::new(UnavailableBackend)));

    assert!(!cache.set("k", &json!(1), None));
    assert_eq!(cache.get("k"), None);
    assert_eq!(cache.clean_expired(), 0);
    assert_eq!(cache.stats(), CacheStats { size_bytes: 2, ..CacheStats::default() });
  }

  #[test]
  fn test_malformed_document_self_heals() {
    let (cache, backend, _) = cache_with_clock();
    backend
      .set_item(StorageKey::Cache.as_str(), "{\"k\": oops")
      .unwrap();

    assert_eq!(cache.get("k"), None);
    assert!(cache.set("k", &json!(1), None));
    assert_eq!(cache.get("k"), Some(json!(1)));
  }

  #[test]
  fn test_unserializable_data_leaves_container_intact() {
    use std::collections::HashMap;

    let (cache, _, _) = cache_with_clock();
    cache.set("good", &json!(1), None);

    let mut bad = HashMap::new();
    bad.insert((1, 2), "tuple keys are not JSON");

    assert!(!cache.set("bad", &bad, None));
    assert_eq!(cache.get("good"), Some(json!(1)));
    assert_eq!(cache.stats().total, 1);
  }

  #[test]
  fn test_persisted_layout() {
    let (cache, backend, _) = cache_with_clock();
    cache.set("k", &json!({ "a": 1 }), Some(500));

    let raw = backend
      .get_item(StorageKey::Cache.as_str())
      .unwrap()
      .unwrap();
    let doc: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
      doc,
      json!({ "k": { "data": { "a": 1 }, "storedAt": START, "ttl": 500 } })
    );
  }

  #[test]
  fn test_shared_storage_sees_same_entries() {
    let (cache, backend, clock) = cache_with_clock();
    let other = ResponseCache::new(PersistentStore::new(backend)).with_clock(clock);

    cache.set("k", &json!("shared"), None);
    assert_eq!(other.get("k"), Some(json!("shared")));
  }

  #[tokio::test]
  async fn test_fetch_miss_then_hit() {
    let (cache, _, _) = cache_with_clock();

    let first = cache
      .fetch("k", || async { Ok(json!({ "n": 1 })) })
      .await
      .unwrap();
    assert!(!first.is_cached());
    assert_eq!(first.data, json!({ "n": 1 }));

    let second = cache
      .fetch("k", || async { Err(eyre!("network should not be called")) })
      .await
      .unwrap();
    assert!(second.is_cached());
    assert_eq!(second.data, json!({ "n": 1 }));
  }

  #[tokio::test]
  async fn test_fetch_error_stores_nothing() {
    let (cache, _, _) = cache_with_clock();

    let result = cache.fetch("k", || async { Err(eyre!("offline")) }).await;
    assert!(result.is_err());
    assert_eq!(cache.stats().total, 0);
  }

  #[tokio::test]
  async fn test_fetch_refetches_after_expiry() {
    let (cache, _, clock) = cache_with_clock();
    cache
      .fetch("k", || async { Ok(json!(1)) })
      .await
      .unwrap();

    clock.advance(DEFAULT_TTL_MS as i64 + 1);

    let result = cache
      .fetch("k", || async { Ok(json!(2)) })
      .await
      .unwrap();
    assert!(!result.is_cached());
    assert_eq!(result.data, json!(2));
  }
}
