#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use habitloop::completion::CompletionService;
use habitloop::config::SchedulerConfig;
use habitloop::conversation::{ConversationLog, StoredConversationLog, Turn};
use habitloop::events::EventBus;
use habitloop::identity::Session;
use habitloop::reminder::ReminderStore;
use habitloop::scheduler::ReminderScheduler;
use habitloop::storage::{KeyValueStore, MemoryKvStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Fresh in-memory storage.
pub fn test_storage() -> Arc<MemoryKvStore> {
    Arc::new(MemoryKvStore::new())
}

/// Parse an RFC 3339 timestamp keeping its offset (the scheduler's wall clock).
pub fn clock(text: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(text).unwrap()
}

pub fn utc(text: &str) -> DateTime<Utc> {
    clock(text).with_timezone(&Utc)
}

/// Scheduler config pinned to UTC.
pub fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        utc_offset_minutes: Some(0),
        ..SchedulerConfig::default()
    }
}

/// Pauses a completion call until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Completion service that records prompts and answers `nudge: <prompt>`.
#[derive(Default)]
pub struct ScriptedCompletion {
    prompts: Mutex<Vec<String>>,
    failing: AtomicBool,
    gate: Option<Arc<Gate>>,
}

impl ScriptedCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let service = Self::default();
        service.failing.store(true, Ordering::SeqCst);
        Arc::new(service)
    }

    pub fn gated() -> (Arc<Self>, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let service = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (Arc::new(service), gate)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("completion backend unavailable");
        }
        Ok(format!("nudge: {prompt}"))
    }
}

/// Conversation log whose appends always fail.
pub struct BrokenConversationLog;

#[async_trait]
impl ConversationLog for BrokenConversationLog {
    async fn append(&self, _turn: Turn) -> Result<()> {
        anyhow::bail!("conversation store is read-only")
    }

    async fn read_all(&self) -> Result<Vec<Turn>> {
        Ok(Vec::new())
    }
}

/// Storage that switches the session to another identity the first time `key` is read,
/// landing the switch between an operation's read and its write.
pub struct SwitchOnRead {
    inner: Arc<MemoryKvStore>,
    session: Session,
    key: String,
    switch_to: String,
    switched: AtomicBool,
}

impl SwitchOnRead {
    pub fn new(inner: Arc<MemoryKvStore>, session: Session, key: &str, switch_to: &str) -> Arc<Self> {
        Arc::new(Self {
            inner,
            session,
            key: key.to_string(),
            switch_to: switch_to.to_string(),
            switched: AtomicBool::new(false),
        })
    }

    pub fn switched(&self) -> bool {
        self.switched.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for SwitchOnRead {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.inner.get(key)?;
        if key == self.key && !self.switched.swap(true, Ordering::SeqCst) {
            self.session.set_identity(&self.switch_to);
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.keys_with_prefix(prefix)
    }
}

/// A scheduler over in-memory storage, signed in as `user`.
pub struct Harness {
    pub storage: Arc<MemoryKvStore>,
    pub session: Session,
    pub reminders: ReminderStore,
    pub conversation: Arc<StoredConversationLog>,
    pub events: EventBus,
    pub scheduler: Arc<ReminderScheduler>,
}

pub fn harness(user: &str, completion: Arc<ScriptedCompletion>) -> Harness {
    let storage = test_storage();
    let session = Session::signed_in(user);
    let shared: Arc<dyn KeyValueStore> = storage.clone();

    let reminders = ReminderStore::new(shared.clone(), session.clone());
    let conversation = Arc::new(StoredConversationLog::new(shared, session.clone()));
    let events = EventBus::new();
    let scheduler = Arc::new(ReminderScheduler::new(
        reminders.clone(),
        completion,
        conversation.clone(),
        events.clone(),
        &scheduler_config(),
    ));

    Harness {
        storage,
        session,
        reminders,
        conversation,
        events,
        scheduler,
    }
}
