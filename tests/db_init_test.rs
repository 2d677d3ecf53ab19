mod helpers;

use habitloop::app::App;
use habitloop::config::HabitConfig;
use habitloop::db;
use habitloop::db::migrations::{CURRENT_SCHEMA_VERSION, NAMESPACE_SCHEME};
use habitloop::model::Task;
use habitloop::reminder::NewReminder;
use habitloop::storage::{KeyValueStore, SqliteKvStore};
use helpers::ScriptedCompletion;

#[test]
fn open_database_creates_parent_dir_and_applies_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("habitloop.db");

    let conn = db::open_database(&path).unwrap();
    assert!(path.exists());

    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(report.namespace_scheme.as_deref(), Some(NAMESPACE_SCHEME));

    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn reopening_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitloop.db");

    drop(db::open_database(&path).unwrap());
    let conn = db::open_database(&path).unwrap();
    assert_eq!(
        db::migrations::get_schema_version(&conn).unwrap(),
        CURRENT_SCHEMA_VERSION
    );
}

#[test]
fn values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitloop.db");

    {
        let store = SqliteKvStore::new(db::open_database(&path).unwrap());
        store.set("pat:entity:task", "[]").unwrap();
        store.set("pat:entity:task", r#"[{"id":"1"}]"#).unwrap();
        store.set("pat:reminders", "[]").unwrap();
        store.set("sam:reminders", "[]").unwrap();
    }

    let store = SqliteKvStore::new(db::open_database(&path).unwrap());
    assert_eq!(
        store.get("pat:entity:task").unwrap().as_deref(),
        Some(r#"[{"id":"1"}]"#)
    );
    assert_eq!(
        store.keys_with_prefix("pat:").unwrap(),
        vec!["pat:entity:task".to_string(), "pat:reminders".to_string()]
    );
}

#[tokio::test]
async fn app_over_sqlite_persists_across_builds() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HabitConfig::default();
    config.storage.db_path = dir.path().join("habitloop.db").to_string_lossy().into_owned();
    config.identity.user = Some("pat@example.com".into());

    let task_id = {
        let storage = habitloop::storage::create_store(&config).unwrap();
        let app = App::with_parts(config.clone(), storage, ScriptedCompletion::new());
        app.reminders.create(NewReminder::daily("floss", "22:00")).unwrap();
        app.tasks.create(Task::daily("Read 20 pages")).unwrap().id
    };

    let app = App::build(config).unwrap();
    assert_eq!(app.reminders.list().unwrap().len(), 1);
    assert_eq!(app.tasks.get(&task_id).unwrap().data.title, "Read 20 pages");

    let outcome = app.scheduler.tick().await.unwrap();
    assert!(!outcome.skipped);
}
