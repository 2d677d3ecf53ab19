//! Shared chat transcript that reminder messages are appended to.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::identity::Session;
use crate::storage::KeyValueStore;

const HISTORY_KEY: &str = "chat:history";

/// Oldest turns beyond this are dropped on append.
pub const DEFAULT_MAX_TURNS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Append-only ordered conversation.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn append(&self, turn: Turn) -> Result<()>;

    async fn read_all(&self) -> Result<Vec<Turn>>;
}

/// Transcript persisted under `{namespace}chat:history`.
#[derive(Clone)]
pub struct StoredConversationLog {
    storage: Arc<dyn KeyValueStore>,
    session: Session,
    max_turns: usize,
}

impl StoredConversationLog {
    pub fn new(storage: Arc<dyn KeyValueStore>, session: Session) -> Self {
        Self {
            storage,
            session,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    fn load(&self, key: &str) -> Result<Vec<Turn>> {
        let Some(text) = self.storage.get(key)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "malformed chat history, treating as empty");
            Vec::new()
        }))
    }
}

#[async_trait]
impl ConversationLog for StoredConversationLog {
    async fn append(&self, turn: Turn) -> Result<()> {
        let key = self.session.scoped_key(HISTORY_KEY);
        let mut turns = self.load(&key)?;
        turns.push(turn);
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
        let text = serde_json::to_string(&turns).context("failed to encode chat history")?;
        self.storage.set(&key, &text)
    }

    async fn read_all(&self) -> Result<Vec<Turn>> {
        self.load(&self.session.scoped_key(HISTORY_KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;

    fn test_log() -> (StoredConversationLog, Arc<MemoryKvStore>) {
        let storage = Arc::new(MemoryKvStore::new());
        let log = StoredConversationLog::new(storage.clone(), Session::signed_in("sam"));
        (log, storage)
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let (log, _) = test_log();
        log.append(Turn::user("hi")).await.unwrap();
        log.append(Turn::assistant("hello!")).await.unwrap();

        let turns = log.read_all().await.unwrap();
        assert_eq!(turns, vec![Turn::user("hi"), Turn::assistant("hello!")]);
    }

    #[tokio::test]
    async fn oldest_turns_are_dropped_past_limit() {
        let (log, _) = test_log();
        let log = log.with_max_turns(2);
        for i in 0..3 {
            log.append(Turn::user(format!("m{i}"))).await.unwrap();
        }
        let turns = log.read_all().await.unwrap();
        assert_eq!(turns, vec![Turn::user("m1"), Turn::user("m2")]);
    }

    #[tokio::test]
    async fn malformed_history_reads_empty() {
        let (log, storage) = test_log();
        storage.set("sam:chat:history", "nope").unwrap();
        assert!(log.read_all().await.unwrap().is_empty());
    }
}
