//! CLI `run` and `tick` commands: drive the reminder scheduler.

use anyhow::Result;
use habitloop::app::App;
use habitloop::events::ReminderEvent;
use tokio::sync::broadcast::error::RecvError;

/// Run the scheduler loop until ctrl-c, echoing fired reminders to stdout.
pub async fn run(app: &App) -> Result<()> {
    let mut events = app.events.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ReminderEvent::ReminderFired { message, .. }) => println!("{message}"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    app.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
        tracing::info!("shutting down");
    })
    .await;

    printer.abort();
    Ok(())
}

/// Run one tick and print its outcome.
pub async fn tick(app: &App) -> Result<()> {
    let outcome = app.scheduler.tick().await?;

    if outcome.due.is_empty() {
        println!("No reminders due.");
        return Ok(());
    }

    println!("Fired {} reminder(s).", outcome.due.len());
    for id in &outcome.delivered {
        println!("  delivered  {id}");
    }
    for id in &outcome.failed {
        println!("  failed     {id}");
    }
    println!("Unread: {}", app.reminders.unread_count());
    Ok(())
}
