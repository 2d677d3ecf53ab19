//! CLI `inbox` command: unread reminder messages.

use anyhow::Result;
use habitloop::app::App;
use habitloop::conversation::{ConversationLog, Role};

/// Print the unread count and the most recent assistant messages.
pub async fn show(app: &App, limit: usize) -> Result<()> {
    let unread = app.reminders.unread_count();
    println!("Unread: {unread}");

    let turns = app.conversation.read_all().await?;
    let recent: Vec<_> = turns
        .iter()
        .filter(|t| t.role == Role::Assistant)
        .rev()
        .take(limit)
        .collect();
    if recent.is_empty() {
        return Ok(());
    }

    println!();
    for turn in recent.into_iter().rev() {
        println!("- {}", turn.content);
    }
    Ok(())
}

pub fn acknowledge(app: &App) -> Result<()> {
    app.scheduler.acknowledge()?;
    println!("Inbox cleared.");
    Ok(())
}
