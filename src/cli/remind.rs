//! CLI `remind` commands: add, list and remove reminders.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use habitloop::app::App;
use habitloop::reminder::{NewReminder, ReminderKind};

pub fn add_daily(app: &App, time: &str, text: &str) -> Result<()> {
    let reminder = app.reminders.create(NewReminder::daily(text, time))?;
    println!("Added daily reminder {} at {time}.", reminder.id);
    Ok(())
}

pub fn add_once(app: &App, at: &str, text: &str) -> Result<()> {
    let at = DateTime::parse_from_rfc3339(at)
        .with_context(|| format!("invalid timestamp `{at}` (expected RFC 3339)"))?
        .with_timezone(&Utc);
    let reminder = app.reminders.create(NewReminder::one_time(text, at))?;
    println!("Added one-time reminder {} at {}.", reminder.id, at.to_rfc3339());
    Ok(())
}

pub fn list(app: &App) -> Result<()> {
    let reminders = app.reminders.list()?;
    if reminders.is_empty() {
        println!("No reminders.");
        return Ok(());
    }

    println!("{:<38} {:<9} {:<26} {}", "ID", "Type", "When", "Text");
    println!("{}", "-".repeat(90));
    for r in &reminders {
        let when = match r.kind {
            ReminderKind::Daily => r.time.clone().unwrap_or_default(),
            ReminderKind::OneTime => {
                let at = r.datetime.map(|at| at.to_rfc3339()).unwrap_or_default();
                if r.fired { format!("{at} (fired)") } else { at }
            }
        };
        println!("{:<38} {:<9} {:<26} {}", r.id, r.kind, when, r.text);
    }
    Ok(())
}

pub fn remove(app: &App, id: &str) -> Result<()> {
    app.reminders.delete(id)?;
    println!("Removed {id}.");
    Ok(())
}
