//! Habit-tracker entity types served by [`crate::entity::EntityStore`].
//!
//! Relationships between types (a [`Completion`] pointing at a [`Task`]) are soft:
//! nothing here checks that the referenced record exists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Date format of the literal `date` fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Custom,
}

/// A habit the user wants to keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency: Frequency,
    /// Target completions per week when `frequency` is `custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_per_week: Option<u8>,
    #[serde(default)]
    pub archived: bool,
}

impl Task {
    pub fn daily(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            frequency: Frequency::Daily,
            target_per_week: None,
            archived: false,
        }
    }
}

impl Entity for Task {
    const ENTITY_TYPE: &'static str = "task";

    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".into());
        }
        if let Some(target) = self.target_per_week {
            if !(1..=7).contains(&target) {
                return Err(format!("target_per_week must be 1..=7, got {target}"));
            }
        }
        Ok(())
    }
}

/// One day's check-off of a [`Task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub task_id: String,
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Completion {
    pub fn on(task_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            task_id: task_id.into(),
            date: date.format(DATE_FORMAT).to_string(),
            note: None,
        }
    }
}

impl Entity for Completion {
    const ENTITY_TYPE: &'static str = "completion";

    fn validate(&self) -> Result<(), String> {
        if self.task_id.is_empty() {
            return Err("task_id must not be empty".into());
        }
        parse_date(&self.date)?;
        Ok(())
    }
}

/// A to-do list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    /// RFC 3339 timestamp set when the item was checked off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl Todo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
            completed_at: None,
            due_date: None,
        }
    }
}

impl Entity for Todo {
    const ENTITY_TYPE: &'static str = "todo";

    fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("text must not be empty".into());
        }
        if let Some(due) = &self.due_date {
            parse_date(due)?;
        }
        Ok(())
    }
}

/// One night's sleep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepLog {
    /// Calendar day the night ended on, `YYYY-MM-DD`.
    pub date: String,
    pub hours: f32,
    /// Subjective quality, 1 (poor) to 5 (great).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

impl Entity for SleepLog {
    const ENTITY_TYPE: &'static str = "sleep_log";

    fn validate(&self) -> Result<(), String> {
        parse_date(&self.date)?;
        if !(0.0..=24.0).contains(&self.hours) {
            return Err(format!("hours must be within 0..=24, got {}", self.hours));
        }
        if let Some(quality) = self.quality {
            if !(1..=5).contains(&quality) {
                return Err(format!("quality must be 1..=5, got {quality}"));
            }
        }
        Ok(())
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| format!("invalid date `{value}`: {e}"))
}
