//! SQLite-backed local storage.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::LocalStore;
use crate::config::Config;

/// SQLite-based key/value storage.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (creating if needed) the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open local database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  fn default_path() -> Result<PathBuf> {
    Ok(Config::data_dir()?.join("local.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run local storage migrations: {}", e))?;

    Ok(())
  }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl LocalStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", key, e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove {}: {}", key, e))?;

    Ok(())
  }
}
