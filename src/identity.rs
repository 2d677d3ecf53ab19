//! Active identity and the storage namespace derived from it.
//!
//! [`Session`] is the explicit scope object handed to every store. It holds at most one
//! identity; stores ask it for the prefix on every call, so a logout or account switch
//! is observed by long-lived store handles immediately.

use std::sync::{Arc, RwLock};
use tokio::sync::watch;

/// Separator closing every namespace prefix. Never produced by sanitization.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Derive the storage-key prefix for an identity.
///
/// The identity is trimmed and lowercased, every character outside `[a-z0-9]` becomes
/// `_`, and [`NAMESPACE_SEPARATOR`] is appended: `Alice.Smith@Example.com` →
/// `alice_smith_example_com:`.
///
/// This is sanitization, not hashing: identities that differ only in punctuation
/// (`a.b@x.io`, `a_b@x.io`) share a prefix. Guest keys carry no prefix at all, so a
/// prefix scan for an identity named like a bucket (`entity`) also returns guest keys.
pub fn namespace_prefix(identity: &str) -> String {
    let mut prefix: String = identity
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' })
        .collect();
    prefix.push(NAMESPACE_SEPARATOR);
    prefix
}

#[derive(Debug, Default)]
struct ScopeState {
    identity: Option<String>,
    prefix: String,
}

/// Identity and prefix read together, so one operation never mixes two namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    identity: Option<String>,
    prefix: String,
}

impl Scope {
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `suffix` under this namespace.
    pub fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    /// The identity, or [`Unauthenticated`] naming the attempted operation.
    pub fn require_identity(&self, operation: &str) -> Result<String, Unauthenticated> {
        self.identity.clone().ok_or_else(|| Unauthenticated {
            operation: operation.to_string(),
        })
    }
}

/// Handle on the active identity. Clones share state.
#[derive(Clone)]
pub struct Session {
    state: Arc<RwLock<ScopeState>>,
    changes: Arc<watch::Sender<Option<String>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity())
            .finish()
    }
}

impl Session {
    /// A session with no active identity (guest scope, empty prefix).
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            state: Arc::new(RwLock::new(ScopeState::default())),
            changes: Arc::new(tx),
        }
    }

    /// A session already signed in as `identity`.
    pub fn signed_in(identity: &str) -> Self {
        let session = Self::new();
        session.set_identity(identity);
        session
    }

    /// Record `identity` as the active one (login / register).
    pub fn set_identity(&self, identity: &str) {
        let prefix = namespace_prefix(identity);
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.identity = Some(identity.trim().to_string());
            state.prefix = prefix.clone();
        }
        tracing::info!(prefix = %prefix, "identity set");
        self.changes.send_replace(Some(identity.trim().to_string()));
    }

    /// Drop the active identity (logout). The prefix becomes empty: guest scope.
    pub fn clear_identity(&self) {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.identity = None;
            state.prefix.clear();
        }
        tracing::info!("identity cleared");
        self.changes.send_replace(None);
    }

    /// Snapshot of the identity and prefix taken under a single lock.
    pub fn scope(&self) -> Scope {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Scope {
            identity: state.identity.clone(),
            prefix: state.prefix.clone(),
        }
    }

    /// Current storage-key prefix. Empty when nobody is signed in.
    pub fn prefix(&self) -> String {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .prefix
            .clone()
    }

    /// Current identity, if any.
    pub fn identity(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .identity
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// Current identity, or [`Unauthenticated`] naming the attempted operation.
    pub fn require_identity(&self, operation: &str) -> Result<String, Unauthenticated> {
        self.scope().require_identity(operation)
    }

    /// `suffix` under the current namespace.
    pub fn scoped_key(&self, suffix: &str) -> String {
        self.scope().key(suffix)
    }

    /// Subscribe to identity changes. The receiver starts at the current identity.
    pub fn watch(&self) -> watch::Receiver<Option<String>> {
        self.changes.subscribe()
    }
}

/// An identity-dependent operation was attempted with nobody signed in.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no signed-in identity: sign in before calling `{operation}`")]
pub struct Unauthenticated {
    pub operation: String,
}
