//! Named, persistent request→response stores.
//!
//! This module mirrors the browser Cache API:
//! - Stores are created on first write and dropped whole on version bumps
//! - One entry per request key per store, enumerated in insertion order
//! - Optional size bound with oldest-first eviction

mod bounded;
#[cfg(test)]
mod memory;
mod storage;
mod traits;

pub use bounded::put_bounded;
#[cfg(test)]
pub use memory::MemoryStorage;
pub use storage::SqliteStorage;
pub use traits::CacheStorage;
