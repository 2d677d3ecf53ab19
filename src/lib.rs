//! Habit and accountability tracker core.
//!
//! habitloop keeps a user's habits, completions, to-dos, sleep logs and reminders in a
//! key-value store, partitioned per signed-in identity. A polling scheduler fires due
//! reminders: it asks a completion service for a short nudge, appends it to the
//! user's conversation log and bumps an unread counter.
//!
//! # Architecture
//!
//! - **Storage**: one JSON value per key, backed by SQLite (`kv_store` table) or memory
//! - **Namespacing**: every key is prefixed with the sanitized active identity
//! - **Scheduler**: single-flight polling tick; state is committed before delivery, so
//!   a reminder is attempted at most once per firing
//! - **Retention**: periodic sweep of stale completions, finished to-dos and sleep logs
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML and environment variables
//! - [`db`]: SQLite initialization, schema, migrations and health checks
//! - [`storage`]: the [`storage::KeyValueStore`] trait and its backends
//! - [`identity`]: the active identity and its key namespace
//! - [`entity`]: generic per-type record store with filtering and change notification
//! - [`model`]: tasks, completions, to-dos and sleep logs
//! - [`retention`]: age-based cleanup
//! - [`reminder`]: reminder records and the unread counter
//! - [`scheduler`]: the reminder polling loop
//! - [`completion`], [`conversation`], [`events`]: collaborators of the scheduler
//! - [`app`]: wiring of all of the above

pub mod app;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod db;
pub mod entity;
pub mod events;
pub mod identity;
pub mod model;
pub mod reminder;
pub mod retention;
pub mod scheduler;
pub mod storage;
