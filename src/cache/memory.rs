//! In-memory cache stores for tests.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::traits::{CacheStorage, CachedResponse};
use crate::http::{RequestKey, Response};

type Stores = BTreeMap<String, Vec<CachedResponse>>;

/// Cache storage that lives only as long as the process.
#[derive(Default)]
pub struct MemoryStorage {
  stores: Mutex<Stores>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, Stores>> {
    self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

fn insert(stores: &mut Stores, store: &str, key: &RequestKey, response: &Response) {
  let entries = stores.entry(store.to_string()).or_default();
  entries.retain(|e| &e.key != key);
  entries.push(CachedResponse {
    key: key.clone(),
    response: response.clone(),
    cached_at: Utc::now(),
  });
}

impl CacheStorage for MemoryStorage {
  fn open(&self, store: &str) -> Result<()> {
    self.lock()?.entry(store.to_string()).or_default();
    Ok(())
  }

  fn match_request(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    Ok(
      self
        .lock()?
        .get(store)
        .and_then(|entries| entries.iter().find(|e| &e.key == key))
        .cloned(),
    )
  }

  fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut stores = self.lock()?;
    insert(&mut stores, store, key, response);
    Ok(())
  }

  fn put_all(&self, store: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let mut stores = self.lock()?;
    for (key, response) in entries {
      insert(&mut stores, store, key, response);
    }
    Ok(())
  }

  fn delete(&self, store: &str, key: &RequestKey) -> Result<bool> {
    let mut stores = self.lock()?;
    let Some(entries) = stores.get_mut(store) else {
      return Ok(false);
    };
    let before = entries.len();
    entries.retain(|e| &e.key != key);
    Ok(entries.len() != before)
  }

  fn keys(&self, store: &str) -> Result<Vec<RequestKey>> {
    Ok(
      self
        .lock()?
        .get(store)
        .map(|entries| entries.iter().map(|e| e.key.clone()).collect())
        .unwrap_or_default(),
    )
  }

  fn names(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.keys().cloned().collect())
  }

  fn delete_store(&self, store: &str) -> Result<bool> {
    Ok(self.lock()?.remove(store).is_some())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn key(path: &str) -> RequestKey {
    RequestKey::get(&Url::parse("https://shop.example").unwrap().join(path).unwrap())
  }

  #[test]
  fn test_one_entry_per_key() {
    let storage = MemoryStorage::new();
    storage.put("s", &key("/a"), &Response::text(200, "1")).unwrap();
    storage.put("s", &key("/b"), &Response::text(200, "2")).unwrap();
    storage.put("s", &key("/a"), &Response::text(200, "3")).unwrap();

    assert_eq!(storage.keys("s").unwrap(), vec![key("/b"), key("/a")]);
    let hit = storage.match_request("s", &key("/a")).unwrap().unwrap();
    assert_eq!(hit.response.body_text(), "3");
  }

  #[test]
  fn test_open_creates_empty_store() {
    let storage = MemoryStorage::new();
    storage.open("static").unwrap();

    assert_eq!(storage.names().unwrap(), vec!["static"]);
    assert_eq!(storage.count("static").unwrap(), 0);
  }
}
