//! Size-bounded insertion for stores that must not grow without limit.

use color_eyre::Result;

use super::traits::CacheStorage;
use crate::http::{RequestKey, Response};

/// Insert `response`, first evicting the oldest entry if the store is full.
///
/// "Oldest" is the first key in enumeration order, i.e. the least recently
/// inserted, not the least recently read. Replacing an existing key never
/// evicts. At most one entry is evicted per call.
///
/// Returns the evicted key, if any.
pub fn put_bounded<S: CacheStorage + ?Sized>(
  storage: &S,
  store: &str,
  key: &RequestKey,
  response: &Response,
  limit: usize,
) -> Result<Option<RequestKey>> {
  let mut evicted = None;

  if storage.match_request(store, key)?.is_none() {
    let keys = storage.keys(store)?;
    if keys.len() >= limit {
      if let Some(oldest) = keys.into_iter().next() {
        storage.delete(store, &oldest)?;
        evicted = Some(oldest);
      }
    }
  }

  storage.put(store, key, response)?;
  Ok(evicted)
}
