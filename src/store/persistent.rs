//! JSON values over a [`StorageBackend`], with failures logged and absorbed.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use super::backend::StorageBackend;

/// Resilient JSON store.
///
/// No method returns an error. Reads fall back to the caller's default and
/// writes report `false`, so every consumer keeps working when the backend
/// is full, disabled or holds garbage.
pub struct PersistentStore<B: ?Sized> {
  backend: Arc<B>,
}

impl<B: StorageBackend + ?Sized> PersistentStore<B> {
  pub fn new(backend: Arc<B>) -> Self {
    Self { backend }
  }

  /// Read and deserialize `key`, or return `default`.
  pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
    match self.backend.get_item(key) {
      Ok(Some(raw)) if !raw.is_empty() => match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
          warn!(key, error = %e, "Stored value is not valid, using default");
          default
        }
      },
      Ok(_) => default,
      Err(e) => {
        error!(key, error = %e, "Error reading from storage");
        default
      }
    }
  }

  /// Serialize and write `value` under `key`.
  pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
    let raw = match serde_json::to_string(value) {
      Ok(raw) => raw,
      Err(e) => {
        error!(key, error = %e, "Error serializing value for storage");
        return false;
      }
    };

    match self.backend.set_item(key, &raw) {
      Ok(()) => true,
      Err(e) => {
        error!(key, error = %e, "Error writing to storage");
        false
      }
    }
  }

  pub fn remove(&self, key: &str) -> bool {
    match self.backend.remove_item(key) {
      Ok(()) => true,
      Err(e) => {
        error!(key, error = %e, "Error removing from storage");
        false
      }
    }
  }

  /// Wipe every slot of the backend, not only the ones this store wrote.
  pub fn clear(&self) -> bool {
    match self.backend.clear() {
      Ok(()) => true,
      Err(e) => {
        error!(error = %e, "Error clearing storage");
        false
      }
    }
  }

  /// Byte length of the raw document stored under `key`.
  pub fn raw_len(&self, key: &str) -> Option<usize> {
    match self.backend.get_item(key) {
      Ok(raw) => raw.map(|r| r.len()),
      Err(e) => {
        error!(key, error = %e, "Error reading from storage");
        None
      }
    }
  }

  /// Whether the backend answers reads at all.
  pub fn is_available(&self) -> bool {
    self.backend.get_item("cm-analyzer-availability").is_ok()
  }
}

impl<B: ?Sized> Clone for PersistentStore<B> {
  fn clone(&self) -> Self {
    Self {
      backend: Arc::clone(&self.backend),
    }
  }
}
