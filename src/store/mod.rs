//! Injected key-value persistence.
//!
//! Uses `rusqlite` with bundled SQLite. Each stateful component owns one
//! logical namespace inside a shared [`KeyValueStore`] and receives a
//! [`Namespace`] handle explicitly — no ambient singletons. Values are
//! simple scalars: epoch-millis integers, `"0"`/`"1"` booleans, and
//! delimited strings. Fields are independent, so there is no versioning or
//! migration logic.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension};

/// Read/write access to namespaced string keys.
///
/// Write failures are handled inside the implementation (logged, then
/// dropped); callers treat writes as infallible so a transient persistence
/// problem never propagates into the enforcement path.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<String>;
    fn put(&self, namespace: &str, key: &str, value: &str);
    fn remove(&self, namespace: &str, key: &str);
}

/// SQLite-backed store. One `prefs` table keyed by (namespace, key).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS prefs (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            ",
        )?;

        // Enable WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, namespace: &str, key: &str) -> Option<String> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .prepare_cached("SELECT value FROM prefs WHERE namespace = ?1 AND key = ?2")
            .and_then(|mut stmt| {
                stmt.query_row(params![namespace, key], |row| row.get(0))
                    .optional()
            });
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read {namespace}/{key}: {e}");
                None
            }
        }
    }

    fn put(&self, namespace: &str, key: &str, value: &str) {
        let conn = self.conn.lock().unwrap();
        if let Err(e) = conn.execute(
            "INSERT OR REPLACE INTO prefs (namespace, key, value) VALUES (?1, ?2, ?3)",
            params![namespace, key, value],
        ) {
            tracing::warn!("Failed to write {namespace}/{key}: {e}");
        }
    }

    fn remove(&self, namespace: &str, key: &str) {
        let conn = self.conn.lock().unwrap();
        if let Err(e) = conn.execute(
            "DELETE FROM prefs WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        ) {
            tracing::warn!("Failed to remove {namespace}/{key}: {e}");
        }
    }
}

/// In-memory store for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<(String, String), String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Option<String> {
        self.entries
            .get(&(namespace.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    fn put(&self, namespace: &str, key: &str, value: &str) {
        self.entries
            .insert((namespace.to_string(), key.to_string()), value.to_string());
    }

    fn remove(&self, namespace: &str, key: &str) {
        self.entries
            .remove(&(namespace.to_string(), key.to_string()));
    }
}

/// A component's view of one logical namespace, with typed accessors for the
/// scalar encodings used across the crate.
#[derive(Clone)]
pub struct Namespace {
    store: Arc<dyn KeyValueStore>,
    name: String,
}

impl Namespace {
    pub fn new(store: Arc<dyn KeyValueStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.store.get(&self.name, key)
    }

    pub fn put_string(&self, key: &str, value: &str) {
        self.store.put(&self.name, key, value);
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_string(key).and_then(|v| v.parse().ok())
    }

    pub fn put_i64(&self, key: &str, value: i64) {
        self.put_string(key, &value.to_string());
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_string(key).map(|v| v == "1")
    }

    pub fn put_bool(&self, key: &str, value: bool) {
        self.put_string(key, if value { "1" } else { "0" });
    }

    pub fn remove(&self, key: &str) {
        self.store.remove(&self.name, key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_string(key).is_some()
    }
}
