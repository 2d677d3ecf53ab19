//! Reminder definitions, their namespaced store, and the unread counter.

pub mod store;
pub mod types;

pub use store::ReminderStore;
pub use types::{NewReminder, Reminder, ReminderKind, ReminderPatch, TIME_FORMAT};

use crate::identity::Unauthenticated;

pub type ReminderResult<T> = Result<T, ReminderError>;

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("reminder not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Unauthenticated(#[from] Unauthenticated),

    #[error("invalid reminder schedule: {0}")]
    InvalidSchedule(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
