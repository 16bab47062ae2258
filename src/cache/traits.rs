//! Core trait and types for the named cache stores.

use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::http::{RequestKey, Response};

/// A response held in a cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub key: RequestKey,
  pub response: Response,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// A set of named request→response stores.
///
/// Each store holds at most one entry per `RequestKey`. `put` on an existing
/// key replaces the entry and moves it to the end of the enumeration order,
/// so `keys()` lists entries oldest-inserted first.
///
/// Individual operations are atomic; no ordering is promised across callers.
pub trait CacheStorage: Send + Sync {
  /// Create the store if it does not exist yet.
  fn open(&self, store: &str) -> Result<()>;

  /// Look up a request in one store.
  fn match_request(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Insert or replace an entry, creating the store on first write.
  fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()>;

  /// Remove an entry. Returns whether anything was deleted.
  fn delete(&self, store: &str, key: &RequestKey) -> Result<bool>;

  /// Keys of one store in insertion order.
  fn keys(&self, store: &str) -> Result<Vec<RequestKey>>;

  /// Names of every existing store.
  fn names(&self) -> Result<Vec<String>>;

  /// Drop a whole store with all its entries.
  fn delete_store(&self, store: &str) -> Result<bool>;

  fn count(&self, store: &str) -> Result<usize> {
    Ok(self.keys(store)?.len())
  }

  /// Write a batch of entries. Either all are stored or none.
  fn put_all(&self, store: &str, entries: &[(RequestKey, Response)]) -> Result<()>;
}
