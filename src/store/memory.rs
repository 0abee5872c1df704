use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::LocalStore;

/// Storage that lives only as long as the process.
/// Used when `storage.ephemeral` is set.
#[derive(Default)]
pub struct MemoryStore {
  values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl LocalStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(values.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.remove(key);
    Ok(())
  }
}
