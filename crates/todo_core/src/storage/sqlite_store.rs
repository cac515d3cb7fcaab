//! Single-file SQLite backend.
//!
//! Layout: table `tasks` maps the JSON-encoded task key to the JSON-encoded
//! task list; table `subscribers` maps the 8-byte little-endian chat id to a
//! one-byte presence marker.

use crate::error::AppError;
use crate::model::{Task, TaskKey};
use crate::storage::{
    SUBSCRIBER_SENTINEL, SubscriberStore, TaskStore, decode_subscriber_key, decode_tasks,
    encode_subscriber_key, encode_task_key, encode_tasks,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    key   BLOB PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS subscribers (
    key   BLOB PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
);
";

const UPSERT_TASKS: &str = "INSERT INTO tasks (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";

/// SQLite-backed store. All access goes through one connection mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| AppError::io(format!("{}: {}", parent.display(), err)))?;
        }
        let conn = Connection::open(path)
            .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(|err| AppError::io(err.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::storage_read("sqlite connection lock poisoned"))
    }
}

fn read_tasks(conn: &Connection, key: &[u8]) -> Result<Vec<Task>, AppError> {
    let value: Option<Vec<u8>> = conn
        .query_row(
            "SELECT value FROM tasks WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| AppError::storage_read(err.to_string()))?;
    match value {
        Some(bytes) => decode_tasks(&bytes),
        None => Ok(Vec::new()),
    }
}

impl TaskStore for SqliteStore {
    fn initialize(&self) -> Result<(), AppError> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)
            .map_err(|err| AppError::storage_write(err.to_string()))
    }

    fn get(&self, key: &TaskKey) -> Result<Vec<Task>, AppError> {
        let key_bytes =
            encode_task_key(key).map_err(|err| AppError::storage_read(err.message()))?;
        let conn = self.lock()?;
        read_tasks(&conn, &key_bytes)
    }

    fn put(&self, key: &TaskKey, tasks: &[Task]) -> Result<(), AppError> {
        let key_bytes = encode_task_key(key)?;
        let value = encode_tasks(tasks)?;
        let conn = self.lock()?;
        conn.execute(UPSERT_TASKS, params![key_bytes, value])
            .map_err(|err| AppError::storage_write(err.to_string()))?;
        Ok(())
    }

    fn modify(
        &self,
        key: &TaskKey,
        apply: &mut dyn FnMut(&mut Vec<Task>) -> Result<(), AppError>,
    ) -> Result<Vec<Task>, AppError> {
        let key_bytes = encode_task_key(key)?;
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|err| AppError::storage_write(err.to_string()))?;
        let mut tasks = read_tasks(&tx, &key_bytes)?;
        apply(&mut tasks)?;
        let value = encode_tasks(&tasks)?;
        tx.execute(UPSERT_TASKS, params![key_bytes, value])
            .map_err(|err| AppError::storage_write(err.to_string()))?;
        tx.commit()
            .map_err(|err| AppError::storage_write(err.to_string()))?;
        Ok(tasks)
    }
}

impl SubscriberStore for SqliteStore {
    fn remember_subscriber(&self, chat_id: i64) -> Result<(), AppError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO subscribers (key, value) VALUES (?1, ?2)",
            params![&encode_subscriber_key(chat_id)[..], &SUBSCRIBER_SENTINEL[..]],
        )
        .map_err(|err| AppError::storage_write(err.to_string()))?;
        Ok(())
    }

    fn forget_subscriber(&self, chat_id: i64) -> Result<(), AppError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM subscribers WHERE key = ?1",
            params![&encode_subscriber_key(chat_id)[..]],
        )
        .map_err(|err| AppError::storage_write(err.to_string()))?;
        Ok(())
    }

    fn subscribers(&self) -> Result<Vec<i64>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key FROM subscribers ORDER BY key")
            .map_err(|err| AppError::storage_read(err.to_string()))?;
        let keys = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|err| AppError::storage_read(err.to_string()))?;

        let mut subscribers = Vec::new();
        for key in keys {
            let key = key.map_err(|err| AppError::storage_read(err.to_string()))?;
            subscribers.push(decode_subscriber_key(&key)?);
        }
        Ok(subscribers)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::model::Task;
    use crate::storage::test_support::{exercise_store, key, temp_path};
    use crate::storage::{SubscriberStore, TaskStore};
    use rusqlite::{Connection, params};

    #[test]
    fn sqlite_store_behaves_like_a_store() {
        exercise_store(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn persisted_layout_matches_wire_format() {
        let path = temp_path("layout.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.initialize().unwrap();
            store.append(&key(123, 15), Task::new("Learn Go")).unwrap();
            store.remember_subscriber(258).unwrap();
        }

        let conn = Connection::open(&path).unwrap();
        let (task_key, task_value): (Vec<u8>, Vec<u8>) = conn
            .query_row("SELECT key, value FROM tasks", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        let (sub_key, sub_value): (Vec<u8>, Vec<u8>) = conn
            .query_row("SELECT key, value FROM subscribers", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        drop(conn);
        std::fs::remove_file(&path).ok();

        assert_eq!(
            String::from_utf8(task_key).unwrap(),
            r#"{"ChatID":123,"Date":{"Year":2025,"Month":3,"Day":15}}"#
        );
        assert_eq!(
            String::from_utf8(task_value).unwrap(),
            r#"[{"Job":"Learn Go","Done":false}]"#
        );
        assert_eq!(sub_key, vec![2, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(sub_value, vec![1]);
    }

    #[test]
    fn contents_survive_reopen() {
        let path = temp_path("reopen.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.initialize().unwrap();
            store.put(&key(5, 1), &[Task::new("a"), Task::new("b")]).unwrap();
            store.remember_subscriber(5).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        store.initialize().unwrap();
        let tasks = store.get(&key(5, 1)).unwrap();
        let subscribers = store.subscribers().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(tasks, vec![Task::new("a"), Task::new("b")]);
        assert_eq!(subscribers, vec![5]);
    }

    #[test]
    fn corrupt_value_is_a_read_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        {
            let conn = store.lock().unwrap();
            let key_bytes = crate::storage::encode_task_key(&key(1, 1)).unwrap();
            conn.execute(
                "INSERT INTO tasks (key, value) VALUES (?1, ?2)",
                params![key_bytes, b"not json".to_vec()],
            )
            .unwrap();
        }

        let err = store.get(&key(1, 1)).unwrap_err();
        assert_eq!(err.code(), "storage_read");
    }

    #[test]
    fn failed_modify_writes_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store.put(&key(1, 1), &[Task::new("a")]).unwrap();

        let err = store.mark_done(&key(1, 1), 3).unwrap_err();
        assert_eq!(err.code(), "selection_out_of_range");
        assert_eq!(store.get(&key(1, 1)).unwrap(), vec![Task::new("a")]);
    }

    #[test]
    fn reads_before_initialize_fail_cleanly() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.get(&key(1, 1)).unwrap_err();
        assert_eq!(err.code(), "storage_read");
    }
}
