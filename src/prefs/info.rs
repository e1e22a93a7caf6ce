//! Whole-application storage maintenance.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::store::{PersistentStore, StorageBackend, StorageKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
  pub key: &'static str,
  pub size: usize,
  pub size_kb: String,
}

/// Bytes used per application slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
  pub total_size: usize,
  pub total_size_kb: String,
  /// Only slots that currently hold data
  pub details: BTreeMap<&'static str, SlotInfo>,
  pub available: bool,
}

fn kib(bytes: usize) -> String {
  format!("{:.2}", bytes as f64 / 1024.0)
}

/// Remove every application slot. Other data in the backend is kept.
pub fn clear_all_data<B: StorageBackend + ?Sized>(store: &PersistentStore<B>) -> bool {
  let mut all_removed = true;
  for key in StorageKey::ALL {
    all_removed &= store.remove(key.as_str());
  }
  info!("All application data cleared");
  all_removed
}

pub fn storage_info<B: StorageBackend + ?Sized>(store: &PersistentStore<B>) -> StorageInfo {
  let mut details = BTreeMap::new();
  let mut total_size = 0;

  for key in StorageKey::ALL {
    if let Some(size) = store.raw_len(key.as_str()) {
      total_size += size;
      details.insert(
        key.name(),
        SlotInfo {
          key: key.as_str(),
          size,
          size_kb: kib(size),
        },
      );
    }
  }

  StorageInfo {
    total_size,
    total_size_kb: kib(total_size),
    details,
    available: store.is_available(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{MemoryBackend, UnavailableBackend};
  use std::sync::Arc;

  #[test]
  fn test_storage_info_reports_written_slots() {
    let store = PersistentStore::new(Arc::new(MemoryBackend::new()));
    store.set(StorageKey::Theme.as_str(), "dark");
    store.set(StorageKey::CompactMode.as_str(), &true);

    let info = storage_info(&store);
    assert!(info.available);
    assert_eq!(info.details.len(), 2);
    assert_eq!(info.details["theme"].size, 6);
    assert_eq!(info.details["compact_mode"].size, 4);
    assert_eq!(info.total_size, 10);
    assert_eq!(info.total_size_kb, "0.01");
  }

  #[test]
  fn test_clear_all_data_keeps_foreign_slots() {
    let backend = Arc::new(MemoryBackend::new());
    let store = PersistentStore::new(Arc::clone(&backend));
    store.set(StorageKey::Cache.as_str(), "{}");
    store.set(StorageKey::Theme.as_str(), "dark");
    store.set("someone-else", &1);

    assert!(clear_all_data(&store));

    assert_eq!(storage_info(&store).total_size, 0);
    assert_eq!(store.get("someone-else", 0), 1);
  }

  #[test]
  fn test_storage_info_when_unavailable() {
    let store = PersistentStore::new(Arc::new(UnavailableBackend));
    let info = storage_info(&store);
    assert!(!info.available);
    assert!(info.details.is_empty());
    assert!(!clear_all_data(&store));
  }
}
