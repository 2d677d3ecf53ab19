//! Reminder polling loop.
//!
//! A tick runs in two phases. Phase 1 loads the namespace's reminders, decides which
//! are due, stamps them (`last_fired`, and `fired` for one-time reminders) and commits
//! that with a single save. Phase 2 takes each due reminder in turn: it counts it as
//! unread, then attempts delivery (completion request, conversation-log append, fired
//! event). Delivery is at most one attempt; a failure is logged and rolls back neither
//! phase 1 nor the unread count.
//!
//! The namespace is read once per tick, so an identity change mid-tick cannot move one
//! user's reminders or counter into another user's namespace.
//!
//! At most one tick runs at a time. A tick started while another is in flight (for
//! example while the first waits on the completion service) returns immediately with
//! [`TickOutcome::skipped`] set. Ticks are never queued and there is no catch-up: a
//! daily reminder whose minute passes without a tick is missed for that day.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, Local, Timelike, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::completion::CompletionService;
use crate::config::SchedulerConfig;
use crate::conversation::{ConversationLog, Turn};
use crate::events::{EventBus, ReminderEvent};
use crate::identity::Scope;
use crate::reminder::{Reminder, ReminderKind, ReminderStore, TIME_FORMAT};
use crate::retention::RetentionSweep;

/// What a tick did.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TickOutcome {
    /// Another tick was in flight; nothing was evaluated.
    pub skipped: bool,
    /// Reminders whose state transition was committed this tick.
    pub due: Vec<String>,
    /// Reminders whose message reached the conversation log.
    pub delivered: Vec<String>,
    /// Reminders whose delivery failed after the transition was committed.
    pub failed: Vec<String>,
}

impl TickOutcome {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

pub struct ReminderScheduler {
    reminders: ReminderStore,
    completion: Arc<dyn CompletionService>,
    conversation: Arc<dyn ConversationLog>,
    events: EventBus,
    suppression_window: Duration,
    utc_offset: Option<FixedOffset>,
    in_flight: Mutex<()>,
}

impl ReminderScheduler {
    pub fn new(
        reminders: ReminderStore,
        completion: Arc<dyn CompletionService>,
        conversation: Arc<dyn ConversationLog>,
        events: EventBus,
        config: &SchedulerConfig,
    ) -> Self {
        let utc_offset = config.utc_offset_minutes.and_then(fixed_offset);
        Self {
            reminders,
            completion,
            conversation,
            events,
            suppression_window: Duration::seconds(config.suppression_window_secs),
            utc_offset,
            in_flight: Mutex::new(()),
        }
    }

    /// Wall clock used to match daily reminder times.
    pub fn now(&self) -> DateTime<FixedOffset> {
        match self.utc_offset {
            Some(offset) => Utc::now().with_timezone(&offset),
            None => Local::now().fixed_offset(),
        }
    }

    pub async fn tick(&self) -> Result<TickOutcome> {
        self.tick_at(self.now()).await
    }

    /// Run one tick as if the wall clock read `now`.
    pub async fn tick_at(&self, now: DateTime<FixedOffset>) -> Result<TickOutcome> {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            debug!("tick already in progress, skipping");
            return Ok(TickOutcome::skipped());
        };

        let scope = self.reminders.session().scope();
        let due = self
            .commit_due(&scope, now)
            .context("failed to commit due reminders")?;

        let mut outcome = TickOutcome {
            due: due.iter().map(|r| r.id.clone()).collect(),
            ..Default::default()
        };

        for reminder in &due {
            match self.reminders.increment_unread_in(&scope) {
                Ok(count) => self
                    .events
                    .publish(ReminderEvent::UnreadCountChanged { count }),
                Err(e) => warn!(reminder_id = %reminder.id, error = %e, "failed to bump unread counter"),
            }
            match self.deliver(reminder, now).await {
                Ok(()) => outcome.delivered.push(reminder.id.clone()),
                Err(e) => {
                    warn!(reminder_id = %reminder.id, error = %format!("{e:#}"), "reminder delivery failed");
                    outcome.failed.push(reminder.id.clone());
                }
            }
        }

        if !outcome.due.is_empty() {
            info!(
                due = outcome.due.len(),
                delivered = outcome.delivered.len(),
                failed = outcome.failed.len(),
                "tick fired reminders"
            );
        }
        Ok(outcome)
    }

    /// Phase 1: stamp every due reminder and persist with one save.
    fn commit_due(&self, scope: &Scope, now: DateTime<FixedOffset>) -> Result<Vec<Reminder>> {
        let mut reminders = self.reminders.list_in(scope)?;
        let fired_at = now.with_timezone(&Utc);

        let mut due = Vec::new();
        for reminder in reminders.iter_mut() {
            if !is_due(reminder, now, self.suppression_window) {
                continue;
            }
            reminder.last_fired = Some(fired_at);
            if reminder.kind == ReminderKind::OneTime {
                reminder.fired = true;
            }
            due.push(reminder.clone());
        }

        if !due.is_empty() {
            self.reminders.save_all_in(scope, &reminders)?;
        }
        Ok(due)
    }

    /// Reset the unread counter and announce the new count.
    pub fn acknowledge(&self) -> Result<()> {
        self.reminders.acknowledge()?;
        self.events
            .publish(ReminderEvent::UnreadCountChanged { count: 0 });
        Ok(())
    }

    /// Phase 2: one delivery attempt.
    async fn deliver(&self, reminder: &Reminder, now: DateTime<FixedOffset>) -> Result<()> {
        let prompt = build_prompt(reminder, now);
        let message = self
            .completion
            .complete(&prompt)
            .await
            .context("completion request failed")?;

        self.conversation
            .append(Turn::assistant(message.clone()))
            .await
            .context("conversation append failed")?;

        self.events.publish(ReminderEvent::ReminderFired {
            message,
            reminder_id: reminder.id.clone(),
        });
        Ok(())
    }

    /// Tick every `interval` until `shutdown` resolves, and run `retention` on its own
    /// cadence when given.
    ///
    /// Each tick is spawned, so a slow tick does not delay the timer; the next one hits
    /// the in-flight guard instead of queueing.
    pub async fn run(
        self: Arc<Self>,
        interval: std::time::Duration,
        retention: Option<(Arc<RetentionSweep>, std::time::Duration)>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (sweep, sweep_every) = match retention {
            Some((sweep, every)) => (Some(sweep), every),
            None => (None, std::time::Duration::from_secs(24 * 60 * 60)),
        };
        let mut sweeper = tokio::time::interval(sweep_every);
        sweeper.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        info!(interval_secs = interval.as_secs(), "reminder scheduler running");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = scheduler.tick().await {
                            error!(error = %format!("{e:#}"), "scheduler tick failed");
                        }
                    });
                }
                _ = sweeper.tick(), if sweep.is_some() => {
                    if let Some(sweep) = &sweep {
                        sweep.run();
                    }
                }
            }
        }

        info!("reminder scheduler stopped");
    }
}

/// Offset for `minutes` east of UTC, or `None` (host local time) when out of range.
fn fixed_offset(minutes: i32) -> Option<FixedOffset> {
    let offset = minutes.checked_mul(60).and_then(FixedOffset::east_opt);
    if offset.is_none() {
        warn!(utc_offset_minutes = minutes, "utc offset out of range, using local time");
    }
    offset
}

/// Whether `reminder` should fire at `now`.
///
/// Daily: the wall-clock hour and minute equal the configured time, and the last
/// firing is at least `suppression_window` ago. One-time: not yet fired and the
/// scheduled instant is not in the future.
pub fn is_due(reminder: &Reminder, now: DateTime<FixedOffset>, suppression_window: Duration) -> bool {
    match reminder.kind {
        ReminderKind::Daily => {
            let Some(at) = reminder.time_of_day() else {
                return false;
            };
            if now.hour() != at.hour() || now.minute() != at.minute() {
                return false;
            }
            match reminder.last_fired {
                Some(last) => now.with_timezone(&Utc) - last >= suppression_window,
                None => true,
            }
        }
        ReminderKind::OneTime => {
            if reminder.fired {
                return false;
            }
            match reminder.datetime {
                Some(at) => at <= now.with_timezone(&Utc),
                None => false,
            }
        }
    }
}

/// First-person prompt asking for a short nudge about `reminder`.
pub fn build_prompt(reminder: &Reminder, now: DateTime<FixedOffset>) -> String {
    let clock = now.format(TIME_FORMAT);
    let setup = match reminder.kind {
        ReminderKind::Daily => format!(
            "I set a daily reminder for {}",
            reminder.time.as_deref().unwrap_or("this time")
        ),
        ReminderKind::OneTime => match reminder.datetime {
            Some(at) => format!(
                "I asked you to remind me at {}",
                at.with_timezone(now.offset()).format("%Y-%m-%d %H:%M")
            ),
            None => "I asked you to remind me".to_string(),
        },
    };
    format!(
        "{setup}: \"{text}\". It's {clock} now. Write me a short, friendly message \
         (one or two sentences) in your own voice reminding me about it, like an \
         accountability buddy checking in.",
        text = reminder.text.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    fn daily(time: &str) -> Reminder {
        Reminder {
            id: "d".into(),
            text: "meditate".into(),
            kind: ReminderKind::Daily,
            time: Some(time.into()),
            datetime: None,
            fired: false,
            last_fired: None,
            created_at: Utc::now(),
        }
    }

    fn one_time(when: &str) -> Reminder {
        Reminder {
            id: "o".into(),
            text: "submit taxes".into(),
            kind: ReminderKind::OneTime,
            time: None,
            datetime: Some(at(when).with_timezone(&Utc)),
            fired: false,
            last_fired: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn daily_matches_exact_minute_only() {
        let window = Duration::seconds(90);
        let r = daily("09:00");
        assert!(is_due(&r, at("2026-10-19T09:00:59+00:00"), window));
        assert!(!is_due(&r, at("2026-10-19T09:01:00+00:00"), window));
        assert!(!is_due(&r, at("2026-10-19T08:59:59+00:00"), window));
    }

    #[test]
    fn daily_time_is_read_in_the_clock_offset() {
        let r = daily("09:00");
        // 07:00 UTC is 09:00 at +02:00
        assert!(is_due(&r, at("2026-10-19T09:00:00+02:00"), Duration::seconds(90)));
    }

    #[test]
    fn daily_suppression_window() {
        let window = Duration::seconds(90);
        let mut r = daily("09:00");
        r.last_fired = Some(at("2026-10-19T09:00:00+00:00").with_timezone(&Utc));
        assert!(!is_due(&r, at("2026-10-19T09:00:30+00:00"), window));
        assert!(is_due(&r, at("2026-10-20T09:00:00+00:00"), window));
    }

    #[test]
    fn one_time_fires_once_when_past() {
        let window = Duration::seconds(90);
        let mut r = one_time("2026-10-19T12:00:00+00:00");
        assert!(!is_due(&r, at("2026-10-19T11:59:00+00:00"), window));
        assert!(is_due(&r, at("2026-10-19T12:00:00+00:00"), window));
        r.fired = true;
        assert!(!is_due(&r, at("2026-10-19T12:05:00+00:00"), window));
    }

    #[test]
    fn one_time_without_instant_never_fires() {
        let mut r = one_time("2026-10-19T12:00:00+00:00");
        r.datetime = None;
        assert!(!is_due(&r, at("2030-01-01T00:00:00+00:00"), Duration::seconds(90)));
    }

    #[test]
    fn out_of_range_offset_falls_back_to_local() {
        assert_eq!(fixed_offset(120), FixedOffset::east_opt(7200));
        assert_eq!(fixed_offset(-300), FixedOffset::west_opt(18000));
        assert_eq!(fixed_offset(24 * 60), None);
        assert_eq!(fixed_offset(i32::MAX), None);
    }

    #[test]
    fn prompt_quotes_reminder_text() {
        let prompt = build_prompt(&daily("09:00"), at("2026-10-19T09:00:10+00:00"));
        assert!(prompt.starts_with("I set a daily reminder for 09:00"));
        assert!(prompt.contains("\"meditate\""));
        assert!(prompt.contains("It's 09:00 now"));

        let prompt = build_prompt(
            &one_time("2026-10-19T12:00:00+00:00"),
            at("2026-10-19T14:01:00+02:00"),
        );
        assert!(prompt.contains("remind me at 2026-10-19 14:00"));
    }
}
