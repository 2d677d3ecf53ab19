//! Read/write path for one entity type.
//!
//! Buckets are handled as raw JSON so a record that no longer validates against its
//! schema is skipped on read but survives every write-back untouched.

use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::query::EntityQuery;
use super::{Entity, Record, StoreError, StoreResult};
use crate::identity::{Scope, Session};
use crate::storage::KeyValueStore;

type Listener<T> = Arc<dyn Fn(&[Record<T>]) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// CRUD, query and change notification for records of `T` in the active namespace.
///
/// Cloning is cheap; clones share subscribers.
pub struct EntityStore<T: Entity> {
    storage: Arc<dyn KeyValueStore>,
    session: Session,
    listeners: Arc<Mutex<Listeners<T>>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for EntityStore<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            session: self.session.clone(),
            listeners: self.listeners.clone(),
            _entity: PhantomData,
        }
    }
}

/// Handle returned by [`EntityStore::subscribe`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Stop receiving notifications. Stored data is unaffected.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl<T: Entity> EntityStore<T> {
    pub fn new(storage: Arc<dyn KeyValueStore>, session: Session) -> Self {
        Self {
            storage,
            session,
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
            _entity: PhantomData,
        }
    }

    /// Storage key of this type's bucket in the current namespace.
    pub fn storage_key(&self) -> String {
        Self::key_in(&self.session.scope())
    }

    fn key_in(scope: &Scope) -> String {
        scope.key(&format!("entity:{}", T::ENTITY_TYPE))
    }

    /// Records matching `query`. Never fails: unreadable storage yields an empty list.
    pub fn filter(&self, query: &EntityQuery) -> Vec<Record<T>> {
        let key = self.storage_key();
        let raw = match self.load_raw(&key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(entity_type = T::ENTITY_TYPE, error = %e, "failed to read records");
                return Vec::new();
            }
        };

        let parsed: Vec<Value> = raw
            .into_iter()
            .filter(|value| parse_record::<T>(value).is_some())
            .collect();
        query
            .apply(&parsed)
            .into_iter()
            .filter_map(parse_record::<T>)
            .collect()
    }

    /// Every record of this type in the current namespace, in insertion order.
    pub fn list(&self) -> Vec<Record<T>> {
        self.filter(&EntityQuery::new())
    }

    /// The record with `id`, if present.
    pub fn get(&self, id: &str) -> Option<Record<T>> {
        self.filter(&EntityQuery::new().eq("id", id).limit(1))
            .into_iter()
            .next()
    }

    /// Create a record from `data`, assigning `id`, `created_at` and `created_by`.
    pub fn create(&self, data: T) -> StoreResult<Record<T>> {
        let scope = self.session.scope();
        let identity = scope.require_identity(&format!("{}.create", T::ENTITY_TYPE))?;
        data.validate().map_err(validation_error::<T>)?;

        let key = Self::key_in(&scope);
        let mut raw = self.load_raw(&key)?;

        let record = Record {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            created_by: identity,
            data,
        };
        raw.push(serde_json::to_value(&record)?);

        self.persist(&key, &raw)?;
        debug!(entity_type = T::ENTITY_TYPE, id = %record.id, "record created");
        self.notify(&raw);
        Ok(record)
    }

    /// Merge `patch` into the record with `id`.
    ///
    /// Any field may be overwritten, including `id`, `created_at` and `created_by`.
    /// The merged record must still deserialize and validate as `T`.
    pub fn update(&self, id: &str, patch: Map<String, Value>) -> StoreResult<Record<T>> {
        let scope = self.session.scope();
        scope.require_identity(&format!("{}.update", T::ENTITY_TYPE))?;

        let key = Self::key_in(&scope);
        let mut raw = self.load_raw(&key)?;

        let index = raw
            .iter()
            .position(|value| value.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| StoreError::NotFound {
                entity_type: T::ENTITY_TYPE,
                id: id.to_string(),
            })?;

        let mut merged = raw[index].clone();
        match merged.as_object_mut() {
            Some(fields) => fields.extend(patch),
            None => merged = Value::Object(patch),
        }

        let record: Record<T> = serde_json::from_value(merged.clone())
            .map_err(|e| validation_error::<T>(e.to_string()))?;
        record.data.validate().map_err(validation_error::<T>)?;

        raw[index] = merged;
        self.persist(&key, &raw)?;
        debug!(entity_type = T::ENTITY_TYPE, id, "record updated");
        self.notify(&raw);
        Ok(record)
    }

    /// Remove the record with `id`. Deleting a missing id succeeds.
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let scope = self.session.scope();
        scope.require_identity(&format!("{}.delete", T::ENTITY_TYPE))?;

        let key = Self::key_in(&scope);
        let mut raw = self.load_raw(&key)?;
        let before = raw.len();
        raw.retain(|value| value.get("id").and_then(Value::as_str) != Some(id));

        if raw.len() != before {
            self.persist(&key, &raw)?;
            debug!(entity_type = T::ENTITY_TYPE, id, "record deleted");
        } else {
            debug!(entity_type = T::ENTITY_TYPE, id, "delete of missing record");
        }
        self.notify(&raw);
        Ok(())
    }

    /// Keep only raw records for which `keep` returns `true`. Returns the number removed.
    ///
    /// Writes and notifies only when something was removed. Unlike the other mutations
    /// this does not require an identity: maintenance applies to guest scope too.
    pub fn retain_raw(&self, keep: impl Fn(&Value) -> bool) -> StoreResult<usize> {
        let key = self.storage_key();
        let mut raw = self.load_raw(&key)?;
        let before = raw.len();
        raw.retain(|value| keep(value));
        let removed = before - raw.len();

        if removed > 0 {
            self.persist(&key, &raw)?;
            self.notify(&raw);
        }
        Ok(removed)
    }

    /// Register `listener`; it is called synchronously after every write with the full
    /// resulting record set.
    pub fn subscribe(&self, listener: impl Fn(&[Record<T>]) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::new(listener)));
            id
        };

        let registry = Arc::downgrade(&self.listeners);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    let mut listeners = registry.lock().unwrap_or_else(|e| e.into_inner());
                    listeners.entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    /// Read the raw bucket. Missing or malformed values read as empty; backend
    /// failures are returned so a write never clobbers data it could not read.
    fn load_raw(&self, key: &str) -> StoreResult<Vec<Value>> {
        let Some(text) = self.storage.get(key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Value>>(&text) {
            Ok(values) => Ok(values),
            Err(e) => {
                warn!(key, error = %e, "malformed record set, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    fn persist(&self, key: &str, raw: &[Value]) -> StoreResult<()> {
        let text = serde_json::to_string(raw)?;
        self.storage.set(key, &text)?;
        Ok(())
    }

    fn notify(&self, raw: &[Value]) {
        // Snapshot so listeners may subscribe or unsubscribe while being called
        let listeners: Vec<Listener<T>> = {
            let guard = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            guard.entries.iter().map(|(_, l)| l.clone()).collect()
        };
        if listeners.is_empty() {
            return;
        }

        let records: Vec<Record<T>> = raw.iter().filter_map(parse_record::<T>).collect();
        for listener in listeners {
            listener(&records);
        }
    }
}

fn parse_record<T: Entity>(value: &Value) -> Option<Record<T>> {
    match serde_json::from_value::<Record<T>>(value.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(entity_type = T::ENTITY_TYPE, error = %e, "skipping unreadable record");
            None
        }
    }
}

fn validation_error<T: Entity>(message: String) -> StoreError {
    StoreError::Validation {
        entity_type: T::ENTITY_TYPE,
        message,
    }
}
