//! SQLite implementation of the cache stores.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::{CacheStorage, CachedResponse};
use crate::http::{Headers, Method, RequestKey, Response};

/// SQLite-based cache storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at `path`, or at the default location when `None`.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// In-memory database, discarded on drop.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("duka-worker").join("cache.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS cache_stores (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- seq gives the enumeration (insertion) order within a store
CREATE TABLE IF NOT EXISTS cache_entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    store TEXT NOT NULL REFERENCES cache_stores(name) ON DELETE CASCADE,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    response_url TEXT,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (store, key_hash)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_store ON cache_entries(store, seq);
"#;

/// Raw row, converted outside the rusqlite closure so errors can carry context.
struct EntryRow {
  method: String,
  url: String,
  status: u16,
  status_text: String,
  headers: String,
  body: Vec<u8>,
  response_url: Option<String>,
  cached_at: String,
}

impl EntryRow {
  fn into_cached(self) -> Result<CachedResponse> {
    let method = parse_method(&self.method)?;
    let headers: Headers = serde_json::from_str(&self.headers)
      .map_err(|e| eyre!("Failed to parse cached headers for {}: {}", self.url, e))?;

    Ok(CachedResponse {
      key: RequestKey {
        method,
        url: self.url,
      },
      response: Response {
        status: self.status,
        status_text: self.status_text,
        headers,
        body: self.body,
        url: self.response_url,
      },
      cached_at: parse_datetime(&self.cached_at)?,
    })
  }
}

fn insert_entry(
  conn: &Connection,
  store: &str,
  key: &RequestKey,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;
  let hash = key.cache_hash();

  conn
    .execute(
      "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
      params![store],
    )
    .map_err(|e| eyre!("Failed to create cache store {}: {}", store, e))?;

  // Delete then insert so a replaced entry moves to the end of the order
  conn
    .execute(
      "DELETE FROM cache_entries WHERE store = ? AND key_hash = ?",
      params![store, hash],
    )
    .map_err(|e| eyre!("Failed to replace cache entry: {}", e))?;

  conn
    .execute(
      "INSERT INTO cache_entries
         (store, key_hash, method, url, status, status_text, headers, body, response_url, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        store,
        hash,
        key.method.as_str(),
        key.url,
        response.status,
        response.status_text,
        headers,
        response.body,
        response.url,
      ],
    )
    .map_err(|e| eyre!("Failed to store cache entry {}: {}", key, e))?;

  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn open(&self, store: &str) -> Result<()> {
    self
      .lock()?
      .execute(
        "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
        params![store],
      )
      .map_err(|e| eyre!("Failed to create cache store {}: {}", store, e))?;
    Ok(())
  }

  fn match_request(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;

    let row = conn
      .query_row(
        "SELECT method, url, status, status_text, headers, body, response_url, cached_at
         FROM cache_entries WHERE store = ? AND key_hash = ?",
        params![store, key.cache_hash()],
        |row| {
          Ok(EntryRow {
            method: row.get(0)?,
            url: row.get(1)?,
            status: row.get(2)?,
            status_text: row.get(3)?,
            headers: row.get(4)?,
            body: row.get(5)?,
            response_url: row.get(6)?,
            cached_at: row.get(7)?,
          })
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache entry {}: {}", key, e))?;

    row.map(EntryRow::into_cached).transpose()
  }

  fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    insert_entry(&tx, store, key, response)?;
    tx.commit()
      .map_err(|e| eyre!("Failed to commit cache entry: {}", e))
  }

  fn put_all(&self, store: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for (key, response) in entries {
      // An error drops `tx`, rolling back the whole batch
      insert_entry(&tx, store, key, response)?;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit cache batch: {}", e))
  }

  fn delete(&self, store: &str, key: &RequestKey) -> Result<bool> {
    let deleted = self
      .lock()?
      .execute(
        "DELETE FROM cache_entries WHERE store = ? AND key_hash = ?",
        params![store, key.cache_hash()],
      )
      .map_err(|e| eyre!("Failed to delete cache entry {}: {}", key, e))?;
    Ok(deleted > 0)
  }

  fn keys(&self, store: &str) -> Result<Vec<RequestKey>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT method, url FROM cache_entries WHERE store = ? ORDER BY seq")
      .map_err(|e| eyre!("Failed to prepare keys query: {}", e))?;

    let rows: Vec<(String, String)> = stmt
      .query_map(params![store], |row| Ok((row.get(0)?, row.get(1)?)))
      .map_err(|e| eyre!("Failed to query cache keys: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read cache keys: {}", e))?;

    rows
      .into_iter()
      .map(|(method, url)| {
        Ok(RequestKey {
          method: parse_method(&method)?,
          url,
        })
      })
      .collect()
  }

  fn count(&self, store: &str) -> Result<usize> {
    let count: i64 = self
      .lock()?
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE store = ?",
        params![store],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;
    Ok(usize::try_from(count).unwrap_or_default())
  }

  fn names(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT name FROM cache_stores ORDER BY created_at, name")
      .map_err(|e| eyre!("Failed to prepare store query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query cache stores: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache stores: {}", e))?;

    Ok(names)
  }

  fn delete_store(&self, store: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    tx.execute("DELETE FROM cache_entries WHERE store = ?", params![store])
      .map_err(|e| eyre!("Failed to delete entries of {}: {}", store, e))?;
    let deleted = tx
      .execute("DELETE FROM cache_stores WHERE name = ?", params![store])
      .map_err(|e| eyre!("Failed to delete cache store {}: {}", store, e))?;
    tx.commit()
      .map_err(|e| eyre!("Failed to commit store deletion: {}", e))?;
    Ok(deleted > 0)
  }
}

fn parse_method(s: &str) -> Result<Method> {
  Method::parse(s).ok_or_else(|| eyre!("Unknown method in cache: {}", s))
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
