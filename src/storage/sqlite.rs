use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use super::KeyValueStore;

/// SQLite-backed storage over the `kv_store` table.
///
/// The connection sits behind a mutex; each call is a single statement, so a `set`
/// is atomic at the granularity of one value.
#[derive(Clone)]
pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database lock poisoned"))?;
        Ok(f(&conn)?)
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key]))?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            // substr comparison instead of LIKE: prefixes contain `_`
            let mut stmt = conn.prepare(
                "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_store() -> SqliteKvStore {
        SqliteKvStore::new(db::open_memory_database().unwrap())
    }

    #[test]
    fn upsert_overwrites_value() {
        let store = test_store();
        store.set("alice:entity:task", "[]").unwrap();
        store.set("alice:entity:task", "[{\"id\":\"1\"}]").unwrap();

        assert_eq!(
            store.get("alice:entity:task").unwrap().as_deref(),
            Some("[{\"id\":\"1\"}]")
        );
        let count: i64 = store
            .with_conn(|c| c.query_row("SELECT COUNT(*) FROM kv_store", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn prefix_scan_treats_underscore_literally() {
        let store = test_store();
        store.set("a_b:reminders", "[]").unwrap();
        store.set("axb:reminders", "[]").unwrap();

        assert_eq!(store.keys_with_prefix("a_b:").unwrap(), vec!["a_b:reminders"]);
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let store = test_store();
        store.remove("nothing").unwrap();
        assert!(store.get("nothing").unwrap().is_none());
    }
}
