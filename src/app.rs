//! Shared-state wiring: storage, session, stores, scheduler and retention sweep.
//!
//! Every store holds a clone of the same [`Session`], so switching identity on
//! [`App::session`] re-scopes all of them at once.

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::completion::{self, CompletionService};
use crate::config::HabitConfig;
use crate::conversation::StoredConversationLog;
use crate::entity::EntityStore;
use crate::events::EventBus;
use crate::identity::Session;
use crate::model::{Completion, SleepLog, Task, Todo};
use crate::reminder::ReminderStore;
use crate::retention::RetentionSweep;
use crate::scheduler::ReminderScheduler;
use crate::storage::{self, KeyValueStore};

pub struct App {
    pub config: Arc<HabitConfig>,
    pub storage: Arc<dyn KeyValueStore>,
    pub session: Session,
    pub tasks: EntityStore<Task>,
    pub completions: EntityStore<Completion>,
    pub todos: EntityStore<Todo>,
    pub sleep_logs: EntityStore<SleepLog>,
    pub reminders: ReminderStore,
    pub conversation: Arc<StoredConversationLog>,
    pub events: EventBus,
    pub scheduler: Arc<ReminderScheduler>,
    pub retention: Arc<RetentionSweep>,
}

impl App {
    /// Open the configured storage backend and completion provider.
    pub fn build(config: HabitConfig) -> Result<Self> {
        let storage = storage::create_store(&config)?;
        info!(backend = %config.storage.backend, "storage ready");

        let completion = completion::create_service(&config.completion)?;
        info!(provider = %config.completion.provider, "completion provider ready");

        Ok(Self::with_parts(config, storage, completion))
    }

    /// Wire the core around an existing backend and completion provider.
    pub fn with_parts(
        config: HabitConfig,
        storage: Arc<dyn KeyValueStore>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let session = match config.identity.user.as_deref() {
            Some(user) if !user.trim().is_empty() => Session::signed_in(user),
            _ => Session::new(),
        };

        let tasks = EntityStore::new(storage.clone(), session.clone());
        let completions = EntityStore::new(storage.clone(), session.clone());
        let todos = EntityStore::new(storage.clone(), session.clone());
        let sleep_logs = EntityStore::new(storage.clone(), session.clone());
        let reminders = ReminderStore::new(storage.clone(), session.clone());
        let conversation = Arc::new(StoredConversationLog::new(storage.clone(), session.clone()));
        let events = EventBus::new();

        let scheduler = Arc::new(ReminderScheduler::new(
            reminders.clone(),
            completion,
            conversation.clone(),
            events.clone(),
            &config.scheduler,
        ));
        let retention = Arc::new(RetentionSweep::new(
            completions.clone(),
            todos.clone(),
            sleep_logs.clone(),
            &config.retention,
        ));

        Self {
            config: Arc::new(config),
            storage,
            session,
            tasks,
            completions,
            todos,
            sleep_logs,
            reminders,
            conversation,
            events,
            scheduler,
            retention,
        }
    }

    /// Drive the scheduler (and retention, when enabled) until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let tick_every = Duration::from_secs(self.config.scheduler.tick_interval_secs.max(1));
        let retention = self.config.retention.enabled.then(|| {
            let every = Duration::from_secs(self.config.retention.interval_hours.max(1) * 60 * 60);
            (self.retention.clone(), every)
        });

        let mut identity = self.session.watch();
        let watcher = tokio::spawn(async move {
            while identity.changed().await.is_ok() {
                let signed_in = identity.borrow_and_update().is_some();
                info!(signed_in, "identity changed, stores rescoped");
            }
        });

        self.scheduler
            .clone()
            .run(tick_every, retention, shutdown)
            .await;

        watcher.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::TemplateCompletionService;
    use crate::model::Todo;
    use crate::storage::MemoryKvStore;

    fn app(user: Option<&str>) -> App {
        let mut config = HabitConfig::default();
        config.identity.user = user.map(str::to_string);
        App::with_parts(
            config,
            Arc::new(MemoryKvStore::new()),
            Arc::new(TemplateCompletionService::new()),
        )
    }

    #[test]
    fn configured_user_signs_in() {
        let app = app(Some("Pat@Example.com"));
        assert_eq!(app.session.prefix(), "pat_example_com:");
        assert!(app.session.is_authenticated());
    }

    #[test]
    fn without_user_runs_as_guest() {
        let app = app(None);
        assert_eq!(app.session.prefix(), "");
        assert!(app.todos.create(Todo::new("x")).is_err());
    }

    #[test]
    fn stores_share_the_session() {
        let app = app(Some("a"));
        app.todos.create(Todo::new("for a")).unwrap();
        app.session.set_identity("b");
        assert!(app.todos.list().is_empty());
        assert_eq!(app.reminders.session().prefix(), "b:");
    }
}
