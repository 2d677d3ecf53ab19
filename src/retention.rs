//! Retention sweep: prune stale completions, finished to-dos and old sleep logs.
//!
//! Each policy runs independently against the current namespace and goes through
//! [`EntityStore::retain_raw`], so subscribers see the removals. Records whose age
//! field is missing or unparsable are kept. A policy that fails is logged and reported
//! as zero removals; the sweep itself never fails.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::RetentionConfig;
use crate::entity::{Entity, EntityStore};
use crate::model::{Completion, SleepLog, Todo, DATE_FORMAT};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    pub completions_removed: usize,
    pub todos_removed: usize,
    pub sleep_logs_removed: usize,
}

impl RetentionReport {
    pub fn total(&self) -> usize {
        self.completions_removed + self.todos_removed + self.sleep_logs_removed
    }
}

pub struct RetentionSweep {
    completions: EntityStore<Completion>,
    todos: EntityStore<Todo>,
    sleep_logs: EntityStore<SleepLog>,
    config: RetentionConfig,
}

impl RetentionSweep {
    pub fn new(
        completions: EntityStore<Completion>,
        todos: EntityStore<Todo>,
        sleep_logs: EntityStore<SleepLog>,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            completions,
            todos,
            sleep_logs,
            config: config.clone(),
        }
    }

    pub fn run(&self) -> RetentionReport {
        self.run_at(Utc::now())
    }

    /// Sweep as if the current time were `now`.
    pub fn run_at(&self, now: DateTime<Utc>) -> RetentionReport {
        let completion_cutoff = now - Duration::days(self.config.completion_days);
        let todo_cutoff = now - Duration::days(self.config.todo_days);
        let sleep_cutoff = now - Duration::days(self.config.sleep_log_days);

        let report = RetentionReport {
            completions_removed: sweep(&self.completions, |r| {
                keep_completion(r, completion_cutoff)
            }),
            todos_removed: sweep(&self.todos, |r| keep_todo(r, todo_cutoff)),
            sleep_logs_removed: sweep(&self.sleep_logs, |r| keep_sleep_log(r, sleep_cutoff)),
        };

        if report.total() > 0 {
            info!(
                completions = report.completions_removed,
                todos = report.todos_removed,
                sleep_logs = report.sleep_logs_removed,
                "retention sweep removed stale records"
            );
        }
        report
    }
}

fn sweep<T: Entity>(store: &EntityStore<T>, keep: impl Fn(&Value) -> bool) -> usize {
    match store.retain_raw(keep) {
        Ok(removed) => removed,
        Err(e) => {
            warn!(entity_type = T::ENTITY_TYPE, error = %e, "retention policy failed");
            0
        }
    }
}

/// Completions are aged by their literal `date` field.
fn keep_completion(record: &Value, cutoff: DateTime<Utc>) -> bool {
    match field_instant(record, "date") {
        Some(at) => at >= cutoff,
        None => true,
    }
}

/// Incomplete to-dos are always kept; completed ones are aged by `completed_at`,
/// falling back to `created_at`.
fn keep_todo(record: &Value, cutoff: DateTime<Utc>) -> bool {
    if record.get("completed").and_then(Value::as_bool) != Some(true) {
        return true;
    }
    let finished = field_instant(record, "completed_at").or_else(|| field_instant(record, "created_at"));
    match finished {
        Some(at) => at >= cutoff,
        None => true,
    }
}

/// Sleep logs are aged by `date`, falling back to `created_at`.
fn keep_sleep_log(record: &Value, cutoff: DateTime<Utc>) -> bool {
    let logged = field_instant(record, "date").or_else(|| field_instant(record, "created_at"));
    match logged {
        Some(at) => at >= cutoff,
        None => true,
    }
}

/// Parse a field holding either an RFC 3339 timestamp or a `YYYY-MM-DD` date
/// (read as midnight UTC).
fn field_instant(record: &Value, field: &str) -> Option<DateTime<Utc>> {
    let text = record.get(field)?.as_str()?;
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, DATE_FORMAT).ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
