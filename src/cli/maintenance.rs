//! CLI `cleanup` command: one retention sweep over the current namespace.

use anyhow::Result;
use habitloop::app::App;

pub fn cleanup(app: &App) -> Result<()> {
    let retention = &app.config.retention;
    println!(
        "Sweeping records older than {}d (completions), {}d (finished to-dos), {}d (sleep logs)...",
        retention.completion_days, retention.todo_days, retention.sleep_log_days
    );

    let report = app.retention.run();

    if report.total() == 0 {
        println!("Nothing to remove.");
        return Ok(());
    }

    println!("  Completions removed: {}", report.completions_removed);
    println!("  To-dos removed:      {}", report.todos_removed);
    println!("  Sleep logs removed:  {}", report.sleep_logs_removed);
    println!("Removed {} record(s).", report.total());
    Ok(())
}
