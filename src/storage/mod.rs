//! Persistent key → serialized-value storage.
//!
//! Every bucket the core owns (entity record sets, reminders, the unread counter, the
//! conversation log) is one JSON string under one namespaced key. Backends only need
//! whole-value get/set; a `set` replaces the previous value atomically.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use std::sync::Arc;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

/// A durable string key → string value store.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, in ascending order.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Create a storage backend from config.
///
/// `"sqlite"` opens (or creates) the database at `storage.db_path`; `"memory"` keeps
/// everything in process memory and loses it on exit.
pub fn create_store(config: &crate::config::HabitConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.storage.backend.as_str() {
        "sqlite" => {
            let conn = crate::db::open_database(config.resolved_db_path())?;
            Ok(Arc::new(SqliteKvStore::new(conn)))
        }
        "memory" => Ok(Arc::new(MemoryKvStore::new())),
        other => anyhow::bail!("unknown storage backend: {other}. Supported: sqlite, memory"),
    }
}
