mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use habitloop::app::App;
use habitloop::config::HabitConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "habitloop", version, about = "Habit tracker with a reminder scheduler")]
struct Cli {
    /// Identity to act as (overrides `[identity] user` in the config)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reminder scheduler and retention sweep until ctrl-c
    Run,
    /// Run a single scheduler tick and print what fired
    Tick,
    /// Run one retention sweep and print what was removed
    Cleanup,
    /// Manage reminders
    Remind {
        #[command(subcommand)]
        action: RemindAction,
    },
    /// Show unread reminder messages
    Inbox {
        /// Number of recent messages to show
        #[arg(long, default_value_t = 5)]
        limit: usize,

        #[command(subcommand)]
        action: Option<InboxAction>,
    },
    /// Check storage health
    Doctor,
}

#[derive(Subcommand)]
enum RemindAction {
    /// Add a reminder that fires every day at HH:MM
    AddDaily { time: String, text: String },
    /// Add a reminder that fires once at an RFC 3339 timestamp
    AddOnce { at: String, text: String },
    /// List reminders
    List,
    /// Remove a reminder by id
    Remove { id: String },
}

#[derive(Subcommand)]
enum InboxAction {
    /// Mark all reminder messages as read
    Ack,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = HabitConfig::load()?;
    if let Some(user) = cli.user {
        config.identity.user = Some(user);
    }

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Doctor => cli::doctor::doctor(&config)?,
        command => {
            let app = App::build(config)?;
            dispatch(&app, command).await?;
        }
    }

    Ok(())
}

async fn dispatch(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Run => cli::scheduler::run(app).await,
        Command::Tick => cli::scheduler::tick(app).await,
        Command::Cleanup => cli::maintenance::cleanup(app),
        Command::Remind { action } => match action {
            RemindAction::AddDaily { time, text } => cli::remind::add_daily(app, &time, &text),
            RemindAction::AddOnce { at, text } => cli::remind::add_once(app, &at, &text),
            RemindAction::List => cli::remind::list(app),
            RemindAction::Remove { id } => cli::remind::remove(app, &id),
        },
        Command::Inbox { limit, action } => match action {
            Some(InboxAction::Ack) => cli::inbox::acknowledge(app),
            None => cli::inbox::show(app, limit).await,
        },
        Command::Doctor => cli::doctor::doctor(&app.config),
    }
}
