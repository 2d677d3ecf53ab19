//! CLI `doctor` command: run storage diagnostics and print a health report.

use anyhow::{Context, Result};
use habitloop::config::HabitConfig;
use habitloop::db;
use habitloop::identity::namespace_prefix;
use habitloop::storage::{KeyValueStore, SqliteKvStore};

pub fn doctor(config: &HabitConfig) -> Result<()> {
    if config.storage.backend != "sqlite" {
        println!("Storage backend: {} (nothing to check)", config.storage.backend);
        return Ok(());
    }

    let db_path = config.resolved_db_path();
    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run any `habitloop` command to initialize it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("habitloop Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!(
        "Namespace scheme:  {}",
        report.namespace_scheme.as_deref().unwrap_or("(not set)")
    );
    println!("Keys:              {}", report.key_count);

    if let Some(user) = config.identity.user.as_deref() {
        let prefix = namespace_prefix(user);
        let store = SqliteKvStore::new(conn);
        let keys = store.keys_with_prefix(&prefix)?;
        println!();
        println!("Namespace `{prefix}` ({user}):");
        if keys.is_empty() {
            println!("  (empty)");
        }
        for key in keys {
            println!("  {key}");
        }
    }

    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Restore from a backup: cp backup.db {}", db_path.display());
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
