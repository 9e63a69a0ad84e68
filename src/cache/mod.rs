//! Content-addressed recipe caches.
//!
//! Entries are keyed by `(uid, hash)`. Because the hash is derived from the
//! recipe's content, a hit for a given pair is byte-identical to what a
//! network fetch for that pair would return, so the client can skip the
//! fetch entirely. A changed recipe produces a new hash and therefore a new
//! entry; superseded entries are left in place.

use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rusqlite::OptionalExtension;
use serde_json::{Map, Value};

use crate::error::Result;

/// Raw recipe field map as returned by the API, prior to decoding.
pub type CachedFields = Map<String, Value>;

/// Capability contract the sync client relies on.
///
/// `is_cached(uid, hash)` returning true guarantees `read(uid, hash)`
/// returns exactly the payload previously written for that pair, and never
/// content stored under a different hash of the same uid.
pub trait RecipeCache: Send + Sync {
    /// Whether the exact content for `(uid, hash)` is present.
    fn is_cached(&self, uid: &str, hash: &str) -> bool;

    /// The payload previously written for `(uid, hash)`, or a miss.
    fn read(&self, uid: &str, hash: &str) -> Option<CachedFields>;

    /// Store a payload under `(uid, hash)`. An existing entry for the same
    /// pair is left untouched: identical hash means identical content.
    fn write(&self, uid: &str, hash: &str, fields: &CachedFields) -> Result<()>;

    /// Durability checkpoint. The client calls this after every
    /// cache-populating fetch.
    fn save(&self) -> Result<()>;
}

// ── Null cache ──────────────────────────────────────────────────

/// Cache used when caching is disabled: every lookup misses and writes are
/// no-ops, so every resolution goes to the network.
#[derive(Debug, Default)]
pub struct NullCache;

impl RecipeCache for NullCache {
    fn is_cached(&self, _uid: &str, _hash: &str) -> bool {
        false
    }

    fn read(&self, _uid: &str, _hash: &str) -> Option<CachedFields> {
        None
    }

    fn write(&self, _uid: &str, _hash: &str, _fields: &CachedFields) -> Result<()> {
        Ok(())
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }
}

// ── In-memory cache ─────────────────────────────────────────────

/// Process-local cache. Useful for short-lived tools and tests; nothing
/// survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String), CachedFields>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl RecipeCache for MemoryCache {
    fn is_cached(&self, uid: &str, hash: &str) -> bool {
        self.entries
            .lock()
            .contains_key(&(uid.to_string(), hash.to_string()))
    }

    fn read(&self, uid: &str, hash: &str) -> Option<CachedFields> {
        self.entries
            .lock()
            .get(&(uid.to_string(), hash.to_string()))
            .cloned()
    }

    fn write(&self, uid: &str, hash: &str, fields: &CachedFields) -> Result<()> {
        self.entries
            .lock()
            .entry((uid.to_string(), hash.to_string()))
            .or_insert_with(|| fields.clone());
        Ok(())
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }
}

// ── SQLite cache ────────────────────────────────────────────────

/// Persistent cache that survives process restarts.
///
/// One row per `(uid, hash)` pair, payload stored as JSON text. WAL mode
/// keeps reads cheap; `save()` checkpoints the WAL back into the main
/// database file.
pub struct SqliteCache {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = rusqlite::Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS recipe_cache (
                uid TEXT NOT NULL,
                hash TEXT NOT NULL,
                payload TEXT NOT NULL,
                cached_at INTEGER NOT NULL,
                PRIMARY KEY (uid, hash)
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of entries currently held.
    pub fn entry_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM recipe_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl RecipeCache for SqliteCache {
    fn is_cached(&self, uid: &str, hash: &str) -> bool {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT 1 FROM recipe_cache WHERE uid = ?1 AND hash = ?2",
            rusqlite::params![uid, hash],
            |_| Ok(()),
        )
        .optional()
        .ok()
        .flatten()
        .is_some()
    }

    fn read(&self, uid: &str, hash: &str) -> Option<CachedFields> {
        let conn = self.conn.lock();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM recipe_cache WHERE uid = ?1 AND hash = ?2",
                rusqlite::params![uid, hash],
                |row| row.get(0),
            )
            .optional()
            .ok()
            .flatten();

        // A row that fails to parse is treated as a miss so the client
        // refetches rather than serving partial data.
        payload.and_then(|text| serde_json::from_str(&text).ok())
    }

    fn write(&self, uid: &str, hash: &str, fields: &CachedFields) -> Result<()> {
        let payload = serde_json::to_string(fields)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO recipe_cache (uid, hash, payload, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![uid, hash, payload, epoch_secs() as i64],
        )?;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
