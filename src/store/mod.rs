//! Local persisted key/value storage.
//!
//! Holds the cached session, theme preference, the last loaded profile and
//! the pending-signup marker. Values are plain strings (JSON where structured);
//! there is no schema versioning and the last writer wins.

mod memory;
mod sqlite;

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Well-known keys.
pub mod keys {
  pub const SESSION: &str = "auth.session";
  pub const THEME: &str = "theme";
  pub const PENDING_SIGNUP: &str = "signup.pending";

  pub fn profile_cache(user_id: &str) -> String {
    format!("profile.cache.{}", user_id)
  }
}

/// Trait for local storage backends.
pub trait LocalStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;
}

impl<'a> dyn LocalStore + 'a {
  /// Read and deserialize a JSON value. Unparseable values read as missing.
  pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let Some(raw) = self.get(key)? else {
      return Ok(None);
    };
    match serde_json::from_str(&raw) {
      Ok(value) => Ok(Some(value)),
      Err(e) => {
        tracing::warn!(key, error = %e, "discarding unreadable local value");
        Ok(None)
      }
    }
  }

  pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
    self.set(key, &raw)
  }
}
