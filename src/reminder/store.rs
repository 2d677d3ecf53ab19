//! Namespaced reminder persistence.
//!
//! All reminders of a namespace are one JSON array under `{namespace}reminders`; the
//! unread counter is a JSON number under `{namespace}reminders:unread`. Entries that no
//! longer parse as a [`Reminder`] are skipped on read and carried along on every save.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{NewReminder, Reminder, ReminderPatch};
use super::{ReminderError, ReminderResult};
use crate::identity::{Scope, Session};
use crate::storage::KeyValueStore;

const REMINDERS_KEY: &str = "reminders";
const UNREAD_KEY: &str = "reminders:unread";

#[derive(Clone)]
pub struct ReminderStore {
    storage: Arc<dyn KeyValueStore>,
    session: Session,
}

impl ReminderStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, session: Session) -> Self {
        Self { storage, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// All readable reminders of the current namespace, in creation order.
    pub fn list(&self) -> ReminderResult<Vec<Reminder>> {
        self.list_in(&self.session.scope())
    }

    /// All readable reminders of `scope`'s namespace.
    pub fn list_in(&self, scope: &Scope) -> ReminderResult<Vec<Reminder>> {
        let (reminders, _) = self.load(&scope.key(REMINDERS_KEY))?;
        Ok(reminders)
    }

    pub fn get(&self, id: &str) -> ReminderResult<Option<Reminder>> {
        Ok(self.list()?.into_iter().find(|r| r.id == id))
    }

    pub fn create(&self, new: NewReminder) -> ReminderResult<Reminder> {
        let scope = self.session.scope();
        scope.require_identity("reminders.create")?;

        let reminder = Reminder {
            id: uuid::Uuid::now_v7().to_string(),
            text: new.text,
            kind: new.kind,
            time: new.time,
            datetime: new.datetime,
            fired: false,
            last_fired: None,
            created_at: Utc::now(),
        };
        reminder.validate()?;

        let key = scope.key(REMINDERS_KEY);
        let (mut reminders, unreadable) = self.load(&key)?;
        reminders.push(reminder.clone());
        self.write(&key, &reminders, unreadable)?;

        debug!(reminder_id = %reminder.id, kind = %reminder.kind, "reminder created");
        Ok(reminder)
    }

    pub fn update(&self, id: &str, patch: ReminderPatch) -> ReminderResult<Reminder> {
        let scope = self.session.scope();
        scope.require_identity("reminders.update")?;

        let key = scope.key(REMINDERS_KEY);
        let (mut reminders, unreadable) = self.load(&key)?;
        let reminder = reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ReminderError::NotFound(id.to_string()))?;

        let mut edited = reminder.clone();
        patch.apply(&mut edited);
        edited.validate()?;
        *reminder = edited.clone();

        self.write(&key, &reminders, unreadable)?;
        Ok(edited)
    }

    /// Remove the reminder with `id`. Removing a missing id succeeds.
    pub fn delete(&self, id: &str) -> ReminderResult<()> {
        let scope = self.session.scope();
        scope.require_identity("reminders.delete")?;

        let key = scope.key(REMINDERS_KEY);
        let (mut reminders, unreadable) = self.load(&key)?;
        let before = reminders.len();
        reminders.retain(|r| r.id != id);
        if reminders.len() != before {
            self.write(&key, &reminders, unreadable)?;
        }
        Ok(())
    }

    /// Overwrite the namespace's reminders with `reminders` in one write.
    pub fn save_all(&self, reminders: &[Reminder]) -> ReminderResult<()> {
        self.save_all_in(&self.session.scope(), reminders)
    }

    /// Overwrite `scope`'s reminders with `reminders` in one write.
    pub fn save_all_in(&self, scope: &Scope, reminders: &[Reminder]) -> ReminderResult<()> {
        let key = scope.key(REMINDERS_KEY);
        let (_, unreadable) = self.load(&key)?;
        self.write(&key, reminders, unreadable)
    }

    /// Unread reminder messages in the current namespace.
    pub fn unread_count(&self) -> u64 {
        self.unread_count_in(&self.session.scope())
    }

    pub fn unread_count_in(&self, scope: &Scope) -> u64 {
        let key = scope.key(UNREAD_KEY);
        match self.storage.get(&key) {
            Ok(Some(text)) => text.trim().parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "failed to read unread counter");
                0
            }
        }
    }

    /// Add one to the unread counter and return the new value.
    pub fn increment_unread(&self) -> ReminderResult<u64> {
        self.increment_unread_in(&self.session.scope())
    }

    pub fn increment_unread_in(&self, scope: &Scope) -> ReminderResult<u64> {
        let count = self.unread_count_in(scope) + 1;
        self.storage.set(&scope.key(UNREAD_KEY), &count.to_string())?;
        Ok(count)
    }

    /// Reset the unread counter to zero.
    pub fn acknowledge(&self) -> ReminderResult<()> {
        self.storage
            .set(&self.session.scoped_key(UNREAD_KEY), "0")?;
        Ok(())
    }

    fn load(&self, key: &str) -> ReminderResult<(Vec<Reminder>, Vec<Value>)> {
        let Some(text) = self.storage.get(key)? else {
            return Ok((Vec::new(), Vec::new()));
        };
        let raw: Vec<Value> = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "malformed reminder list, treating as empty");
                return Ok((Vec::new(), Vec::new()));
            }
        };

        let mut reminders = Vec::with_capacity(raw.len());
        let mut unreadable = Vec::new();
        for value in raw {
            match serde_json::from_value::<Reminder>(value.clone()) {
                Ok(reminder) => reminders.push(reminder),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable reminder");
                    unreadable.push(value);
                }
            }
        }
        Ok((reminders, unreadable))
    }

    fn write(&self, key: &str, reminders: &[Reminder], unreadable: Vec<Value>) -> ReminderResult<()> {
        let mut raw = reminders
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        raw.extend(unreadable);
        self.storage.set(key, &serde_json::to_string(&raw)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::ReminderKind;
    use crate::storage::MemoryKvStore;

    fn test_store() -> (ReminderStore, Arc<MemoryKvStore>) {
        let storage = Arc::new(MemoryKvStore::new());
        let store = ReminderStore::new(storage.clone(), Session::signed_in("pat@example.com"));
        (store, storage)
    }

    #[test]
    fn create_list_delete() {
        let (store, _) = test_store();
        let daily = store.create(NewReminder::daily("stretch", "09:00")).unwrap();
        let once = store
            .create(NewReminder::one_time("dentist", Utc::now()))
            .unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, daily.id);
        assert_eq!(listed[1].kind, ReminderKind::OneTime);

        store.delete(&once.id).unwrap();
        store.delete(&once.id).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn create_validates_schedule() {
        let (store, _) = test_store();
        let err = store.create(NewReminder::daily("x", "later")).unwrap_err();
        assert!(matches!(err, ReminderError::InvalidSchedule(_)));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn create_requires_identity() {
        let (store, _) = test_store();
        store.session().clear_identity();
        let err = store.create(NewReminder::daily("x", "09:00")).unwrap_err();
        assert!(matches!(err, ReminderError::Unauthenticated(_)));
    }

    #[test]
    fn update_missing_is_not_found() {
        let (store, _) = test_store();
        let err = store.update("nope", ReminderPatch::default()).unwrap_err();
        assert!(matches!(err, ReminderError::NotFound(_)));
    }

    #[test]
    fn unread_counter_increments_and_resets() {
        let (store, _) = test_store();
        assert_eq!(store.unread_count(), 0);
        assert_eq!(store.increment_unread().unwrap(), 1);
        assert_eq!(store.increment_unread().unwrap(), 2);
        store.acknowledge().unwrap();
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn save_all_preserves_unreadable_entries() {
        let (store, storage) = test_store();
        let key = "pat_example_com:reminders";
        storage
            .set(key, r#"[{"id":"old","text":"legacy","type":"weekly"}]"#)
            .unwrap();
        assert!(store.list().unwrap().is_empty());

        let created = store.create(NewReminder::daily("walk", "07:30")).unwrap();
        store.save_all(&[created]).unwrap();

        let raw: Vec<Value> = serde_json::from_str(&storage.get(key).unwrap().unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[1]["id"], "old");
    }

    #[test]
    fn namespaces_are_isolated() {
        let (store, _) = test_store();
        store.create(NewReminder::daily("mine", "09:00")).unwrap();
        store.increment_unread().unwrap();

        store.session().set_identity("someone-else@example.com");
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.unread_count(), 0);
    }
}
