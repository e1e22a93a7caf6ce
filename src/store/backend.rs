//! Raw storage backends and their SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A string-to-string slot store.
///
/// Implementations report every failure as an error; turning those into
/// fallbacks is the job of [`super::PersistentStore`].
pub trait StorageBackend: Send + Sync {
  /// Read the raw value of a slot, `None` if it was never written.
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Write a slot, replacing any previous value.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// Delete a slot. Deleting a missing slot is not an error.
  fn remove_item(&self, key: &str) -> Result<()>;

  /// Delete every slot.
  fn clear(&self) -> Result<()>;
}

/// Backend used when storage is disabled - every operation fails.
pub struct UnavailableBackend;

impl StorageBackend for UnavailableBackend {
  fn get_item(&self, _key: &str) -> Result<Option<String>> {
    Err(eyre!("Storage is not available"))
  }

  fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
    Err(eyre!("Storage is not available"))
  }

  fn remove_item(&self, _key: &str) -> Result<()> {
    Err(eyre!("Storage is not available"))
  }

  fn clear(&self) -> Result<()> {
    Err(eyre!("Storage is not available"))
  }
}

/// Process-local backend. Nothing survives the process.
#[derive(Default)]
pub struct MemoryBackend {
  slots: Mutex<BTreeMap<String, String>>,
  fail_writes: AtomicBool,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make every subsequent write (set, remove, clear) fail.
  #[cfg(test)]
  pub fn fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  fn check_writable(&self) -> Result<()> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(eyre!("Storage write rejected"));
    }
    Ok(())
  }
}

impl StorageBackend for MemoryBackend {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let slots = self
      .slots
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(slots.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    self.check_writable()?;
    let mut slots = self
      .slots
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    slots.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    self.check_writable()?;
    let mut slots = self
      .slots
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    slots.remove(key);
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self.check_writable()?;
    let mut slots = self
      .slots
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    slots.clear();
    Ok(())
  }
}

/// SQLite-backed slot store.
///
/// Each slot is one row. An optional quota caps the total number of bytes
/// (keys plus values) held by the table.
pub struct SqliteBackend {
  conn: Mutex<Connection>,
  quota_bytes: Option<u64>,
}

impl SqliteBackend {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path, quota_bytes: Option<u64>) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open storage at {}: {}", path.display(), e))?;

    Self::with_connection(conn, quota_bytes)
  }

  /// Open a throwaway in-memory database.
  #[cfg(test)]
  pub fn open_in_memory(quota_bytes: Option<u64>) -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory storage: {}", e))?;
    Self::with_connection(conn, quota_bytes)
  }

  fn with_connection(conn: Connection, quota_bytes: Option<u64>) -> Result<Self> {
    let backend = Self {
      conn: Mutex::new(conn),
      quota_bytes,
    };
    backend.run_migrations()?;
    Ok(backend)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("cm-analyzer").join("storage.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORAGE_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;

    Ok(())
  }
}

const STORAGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl StorageBackend for SqliteBackend {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read slot {}: {}", key, e))
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if let Some(quota) = self.quota_bytes {
      // Bytes held by every other slot; the slot being written is replaced.
      let used: i64 = conn
        .query_row(
          "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
           FROM kv_store WHERE key != ?",
          params![key],
          |row| row.get(0),
        )
        .map_err(|e| eyre!("Failed to measure storage usage: {}", e))?;

      let needed = used.max(0) as u64 + (key.len() + value.len()) as u64;
      if needed > quota {
        return Err(eyre!(
          "Storage quota exceeded writing {}: {} bytes needed, {} allowed",
          key,
          needed,
          quota
        ));
      }
    }

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write slot {}: {}", key, e))?;

    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove slot {}: {}", key, e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store", [])
      .map_err(|e| eyre!("Failed to clear storage: {}", e))?;

    Ok(())
  }
}
