//! Generic, user-scoped entity store.
//!
//! One [`EntityStore`] per [`Entity`] type. Records of a type live as one JSON array
//! under `{namespace}entity:{ENTITY_TYPE}`; every write replaces that array whole and
//! notifies the store's subscribers with the complete resulting record set.

pub mod query;
pub mod store;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::identity::Unauthenticated;

pub use query::EntityQuery;
pub use store::{EntityStore, Subscription};

/// A record schema served by an [`EntityStore`].
///
/// Implementors must not declare fields named `id`, `created_at` or `created_by`;
/// those belong to the [`Record`] envelope.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name of the entity type; part of the storage key.
    const ENTITY_TYPE: &'static str;

    /// Boundary validation run on create and after every update merge.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A stored entity with its system-assigned fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    /// UUID v7 (time-sortable).
    pub id: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Identity that created the record.
    pub created_by: String,
    #[serde(flatten)]
    pub data: T,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error(transparent)]
    Unauthenticated(#[from] Unauthenticated),

    #[error("invalid {entity_type}: {message}")]
    Validation {
        entity_type: &'static str,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
