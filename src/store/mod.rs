//! Durable key-value store.
//!
//! Backs the three durable entity classes of the router: health records,
//! session records, and the cached chain configuration. The store offers
//! plain string keys with an optional TTL (refreshed on every write), a
//! field-addressable hash type with a hash-level TTL, prefix enumeration,
//! and atomic multi-write transactions. Everything survives a process
//! restart; expired entries behave as absent and are physically removed
//! lazily or by [`KvStore::sweep_expired`].

mod error;

pub use error::StoreError;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA_VERSION: i64 = 1;

/// Shared durable mapping, safe for concurrent use behind an `Arc`.
///
/// All operations are short local SQLite calls guarded by a single mutex.
pub struct KvStore {
    conn: Mutex<Connection>,
}

impl KvStore {
    /// Open (or create) a store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && std::fs::create_dir_all(parent).is_err() {
                return Err(StoreError::CreateDir(parent.to_path_buf()));
            }
        }
        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a transient in-memory store (used by tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchemaVersion {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                 key        TEXT PRIMARY KEY,
                 value      TEXT NOT NULL,
                 expires_at INTEGER
             );
             CREATE TABLE IF NOT EXISTS kv_hash (
                 name  TEXT NOT NULL,
                 field TEXT NOT NULL,
                 value TEXT NOT NULL,
                 PRIMARY KEY (name, field)
             );
             CREATE TABLE IF NOT EXISTS kv_hash_ttl (
                 name       TEXT PRIMARY KEY,
                 expires_at INTEGER NOT NULL
             );",
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("kv store mutex poisoned")
    }

    /// Read a key. Expired keys read as `None`.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        get_value(&self.lock(), key)
    }

    /// Write a key, replacing any previous value and TTL.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        set_value(&self.lock(), key, value, ttl)
    }

    /// Remove a key. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        delete_key(&self.lock(), key)
    }

    /// Enumerate live keys starting with `prefix`, in lexicographic order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT key FROM kv
             WHERE key >= ?1 AND key < ?2
               AND (expires_at IS NULL OR expires_at > ?3)
             ORDER BY key",
        )?;
        let rows = stmt.query_map(params![prefix, prefix_upper_bound(prefix), now_ms()], |row| {
            row.get(0)
        })?;
        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }

    /// Read one field of a hash. An expired hash reads as empty.
    pub fn hash_get(&self, name: &str, field: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock();
        if !hash_live(&conn, name)? {
            return Ok(None);
        }
        conn.query_row(
            "SELECT value FROM kv_hash WHERE name = ?1 AND field = ?2",
            params![name, field],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    /// Read all fields of a hash.
    pub fn hash_get_all(&self, name: &str) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.lock();
        if !hash_live(&conn, name)? {
            return Ok(Vec::new());
        }
        let mut stmt =
            conn.prepare("SELECT field, value FROM kv_hash WHERE name = ?1 ORDER BY field")?;
        let rows = stmt.query_map(params![name], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut fields = Vec::new();
        for entry in rows {
            fields.push(entry?);
        }
        Ok(fields)
    }

    /// Write one field of a hash. Does not touch the hash TTL.
    pub fn hash_set(&self, name: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        hash_live(&conn, name)?;
        hash_set_field(&conn, name, field, value)
    }

    /// Remove one field of a hash.
    pub fn hash_delete(&self, name: &str, field: &str) -> Result<(), StoreError> {
        hash_delete_field(&self.lock(), name, field)
    }

    /// Set or refresh the TTL of a whole hash.
    pub fn hash_expire(&self, name: &str, ttl: Duration) -> Result<(), StoreError> {
        hash_set_expiry(&self.lock(), name, ttl)
    }

    /// Physically remove every expired key and hash. Returns how many rows
    /// were dropped.
    pub fn sweep_expired(&self) -> Result<usize, StoreError> {
        let conn = self.lock();
        let now = now_ms();
        let mut dropped = conn.execute(
            "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
        )?;
        dropped += conn.execute(
            "DELETE FROM kv_hash WHERE name IN
               (SELECT name FROM kv_hash_ttl WHERE expires_at <= ?1)",
            params![now],
        )?;
        dropped += conn.execute("DELETE FROM kv_hash_ttl WHERE expires_at <= ?1", params![now])?;
        Ok(dropped)
    }

    /// Run `f` against a transactional view; every write it queues commits
    /// atomically, or none do if it returns an error.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&KvTxn<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let out = f(&KvTxn { tx: &tx })?;
        tx.commit()?;
        Ok(out)
    }
}

/// Transactional view handed to [`KvStore::transaction`] closures.
pub struct KvTxn<'a> {
    tx: &'a Transaction<'a>,
}

impl KvTxn<'_> {
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        get_value(self.tx, key)
    }

    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        set_value(self.tx, key, value, ttl)
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        delete_key(self.tx, key)
    }

    /// Remove every key starting with `prefix`. Returns how many existed.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        self.tx
            .execute(
                "DELETE FROM kv WHERE key >= ?1 AND key < ?2",
                params![prefix, prefix_upper_bound(prefix)],
            )
            .map_err(Into::into)
    }

    pub fn hash_set(&self, name: &str, field: &str, value: &str) -> Result<(), StoreError> {
        hash_set_field(self.tx, name, field, value)
    }

    pub fn hash_delete(&self, name: &str, field: &str) -> Result<(), StoreError> {
        hash_delete_field(self.tx, name, field)
    }

    pub fn hash_expire(&self, name: &str, ttl: Duration) -> Result<(), StoreError> {
        hash_set_expiry(self.tx, name, ttl)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Exclusive upper bound of the key range sharing `prefix`. Keys are ASCII
/// (`chain:*`, `session:*`), so appending the maximum scalar value is a
/// strict upper bound for any continuation of the prefix.
fn prefix_upper_bound(prefix: &str) -> String {
    format!("{prefix}\u{10FFFF}")
}

fn expiry_from(ttl: Duration) -> i64 {
    now_ms() + ttl.as_millis() as i64
}

fn get_value(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    conn.query_row(
        "SELECT value FROM kv WHERE key = ?1
           AND (expires_at IS NULL OR expires_at > ?2)",
        params![key, now_ms()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

fn set_value(
    conn: &Connection,
    key: &str,
    value: &str,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    let expires_at = ttl.map(expiry_from);
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)",
        params![key, value, expires_at],
    )?;
    Ok(())
}

fn delete_key(conn: &Connection, key: &str) -> Result<(), StoreError> {
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(())
}

/// Check a hash's TTL, clearing it out if expired. Returns whether the hash
/// is still live (absent TTL rows count as live: the hash persists).
fn hash_live(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let expires_at: Option<i64> = conn
        .query_row(
            "SELECT expires_at FROM kv_hash_ttl WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    match expires_at {
        Some(at) if at <= now_ms() => {
            conn.execute("DELETE FROM kv_hash WHERE name = ?1", params![name])?;
            conn.execute("DELETE FROM kv_hash_ttl WHERE name = ?1", params![name])?;
            Ok(false)
        }
        _ => Ok(true),
    }
}

fn hash_set_field(
    conn: &Connection,
    name: &str,
    field: &str,
    value: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO kv_hash (name, field, value) VALUES (?1, ?2, ?3)",
        params![name, field, value],
    )?;
    Ok(())
}

fn hash_delete_field(conn: &Connection, name: &str, field: &str) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM kv_hash WHERE name = ?1 AND field = ?2",
        params![name, field],
    )?;
    Ok(())
}

fn hash_set_expiry(conn: &Connection, name: &str, ttl: Duration) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO kv_hash_ttl (name, expires_at) VALUES (?1, ?2)",
        params![name, expiry_from(ttl)],
    )?;
    Ok(())
}
