use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ReminderError, ReminderResult};

/// Wall-clock format of a daily reminder's `time`.
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Fires every day at `time`; never reaches a terminal state.
    Daily,
    /// Fires once at `datetime`, then stays `fired`.
    OneTime,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::OneTime => "one_time",
        }
    }
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A stored reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// UUID v7.
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    /// `HH:MM` for daily reminders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Absolute instant for one-time reminders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<DateTime<Utc>>,
    /// One-time reminders only: set once the reminder has been consumed.
    #[serde(default)]
    pub fired: bool,
    #[serde(default)]
    pub last_fired: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Parsed `time` of a daily reminder.
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        self.time
            .as_deref()
            .and_then(|t| NaiveTime::parse_from_str(t.trim(), TIME_FORMAT).ok())
    }

    pub(crate) fn validate(&self) -> ReminderResult<()> {
        if self.text.trim().is_empty() {
            return Err(ReminderError::InvalidSchedule("text must not be empty".into()));
        }
        match self.kind {
            ReminderKind::Daily => {
                if self.time_of_day().is_none() {
                    return Err(ReminderError::InvalidSchedule(format!(
                        "daily reminder needs an HH:MM time, got {:?}",
                        self.time
                    )));
                }
            }
            ReminderKind::OneTime => {
                if self.datetime.is_none() {
                    return Err(ReminderError::InvalidSchedule(
                        "one-time reminder needs a datetime".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Input to [`super::ReminderStore::create`].
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub text: String,
    pub kind: ReminderKind,
    pub time: Option<String>,
    pub datetime: Option<DateTime<Utc>>,
}

impl NewReminder {
    pub fn daily(text: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ReminderKind::Daily,
            time: Some(time.into()),
            datetime: None,
        }
    }

    pub fn one_time(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            kind: ReminderKind::OneTime,
            time: None,
            datetime: Some(at),
        }
    }
}

/// Partial edit applied by [`super::ReminderStore::update`].
#[derive(Debug, Clone, Default)]
pub struct ReminderPatch {
    pub text: Option<String>,
    pub time: Option<String>,
    pub datetime: Option<DateTime<Utc>>,
}

impl ReminderPatch {
    /// Apply to `reminder`. Moving a one-time reminder's `datetime` re-arms it.
    pub(crate) fn apply(self, reminder: &mut Reminder) {
        if let Some(text) = self.text {
            reminder.text = text;
        }
        if let Some(time) = self.time {
            reminder.time = Some(time);
        }
        if let Some(at) = self.datetime {
            if reminder.kind == ReminderKind::OneTime && reminder.datetime != Some(at) {
                reminder.fired = false;
            }
            reminder.datetime = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn daily(time: &str) -> Reminder {
        Reminder {
            id: "r1".into(),
            text: "stretch".into(),
            kind: ReminderKind::Daily,
            time: Some(time.into()),
            datetime: None,
            fired: false,
            last_fired: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn serializes_with_type_tag() {
        let value = serde_json::to_value(daily("09:00")).unwrap();
        assert_eq!(value["type"], "daily");
        assert_eq!(value["time"], "09:00");
        assert_eq!(value["fired"], false);
        assert!(value["last_fired"].is_null());
    }

    #[test]
    fn deserializes_with_defaults() {
        let reminder: Reminder = serde_json::from_value(json!({
            "id": "r2",
            "text": "call mom",
            "type": "one_time",
            "datetime": "2026-10-19T18:00:00Z",
            "created_at": "2026-10-18T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(reminder.kind, ReminderKind::OneTime);
        assert!(!reminder.fired);
        assert!(reminder.last_fired.is_none());
    }

    #[test]
    fn daily_time_must_parse() {
        assert!(daily("09:00").validate().is_ok());
        assert!(daily("25:00").validate().is_err());
        assert!(daily("nine").validate().is_err());
    }

    #[test]
    fn moving_one_time_datetime_rearms() {
        let mut reminder = daily("09:00");
        reminder.kind = ReminderKind::OneTime;
        reminder.datetime = Some(Utc::now());
        reminder.fired = true;

        ReminderPatch {
            datetime: reminder.datetime,
            ..Default::default()
        }
        .apply(&mut reminder);
        assert!(reminder.fired, "same instant keeps the fired state");

        ReminderPatch {
            datetime: Some(Utc::now() + chrono::Duration::hours(1)),
            ..Default::default()
        }
        .apply(&mut reminder);
        assert!(!reminder.fired);
    }
}
