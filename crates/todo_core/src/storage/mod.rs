//! Keyed task storage shared by the conversation and every reminder unit.
//!
//! Two logical namespaces live in each backend: task lists keyed by
//! `(chat id, date)` and the set of subscribed chat ids.

use crate::error::AppError;
use crate::model::{Task, TaskKey};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub mod json_store;
pub mod memory_store;
pub mod sqlite_store;

pub use json_store::JsonStore;
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;

/// Value stored for every subscriber record; only its presence matters.
pub const SUBSCRIBER_SENTINEL: [u8; 1] = [1];

pub trait TaskStore: Send + Sync {
    fn initialize(&self) -> Result<(), AppError>;

    fn get(&self, key: &TaskKey) -> Result<Vec<Task>, AppError>;

    fn put(&self, key: &TaskKey, tasks: &[Task]) -> Result<(), AppError>;

    /// Read-modify-write of one list under the store's write lock.
    ///
    /// Nothing is written when `apply` fails. Returns the list as stored.
    fn modify(
        &self,
        key: &TaskKey,
        apply: &mut dyn FnMut(&mut Vec<Task>) -> Result<(), AppError>,
    ) -> Result<Vec<Task>, AppError>;

    fn append(&self, key: &TaskKey, task: Task) -> Result<Vec<Task>, AppError> {
        let mut pending = Some(task);
        self.modify(key, &mut |tasks| {
            if let Some(task) = pending.take() {
                tasks.push(task);
            }
            Ok(())
        })
    }

    /// Sets `done` on the task at `index` and returns that task.
    fn mark_done(&self, key: &TaskKey, index: usize) -> Result<Task, AppError> {
        let mut updated = None;
        self.modify(key, &mut |tasks| {
            let task = tasks.get_mut(index).ok_or_else(|| {
                AppError::selection_out_of_range(format!(
                    "task {index} does not exist on {}",
                    key.date
                ))
            })?;
            task.done = true;
            updated = Some(task.clone());
            Ok(())
        })?;
        updated.ok_or_else(|| AppError::storage_write("task update was not applied"))
    }
}

pub trait SubscriberStore: Send + Sync {
    fn remember_subscriber(&self, chat_id: i64) -> Result<(), AppError>;

    fn forget_subscriber(&self, chat_id: i64) -> Result<(), AppError>;

    fn subscribers(&self) -> Result<Vec<i64>, AppError>;
}

/// Everything the bot needs from durable storage.
pub trait Store: TaskStore + SubscriberStore {}

impl<T: TaskStore + SubscriberStore> Store for T {}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Json,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "db" => Ok(Self::Sqlite),
            "json" => Ok(Self::Json),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(AppError::invalid_input(format!(
                "unknown store backend: {other}"
            ))),
        }
    }
}

pub fn open_store(backend: StoreBackend, path: &Path) -> Result<Arc<dyn Store>, AppError> {
    let store: Arc<dyn Store> = match backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(path)?),
        StoreBackend::Json => Arc::new(JsonStore::new(path)),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    store.initialize()?;
    tracing::info!(?backend, path = %path.display(), "task store ready");
    Ok(store)
}

pub(crate) fn encode_task_key(key: &TaskKey) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec(key).map_err(|err| AppError::storage_write(err.to_string()))
}

pub(crate) fn encode_tasks(tasks: &[Task]) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec(tasks).map_err(|err| AppError::storage_write(err.to_string()))
}

pub(crate) fn decode_tasks(bytes: &[u8]) -> Result<Vec<Task>, AppError> {
    serde_json::from_slice(bytes).map_err(|err| AppError::storage_read(err.to_string()))
}

pub(crate) fn encode_subscriber_key(chat_id: i64) -> [u8; 8] {
    chat_id.to_le_bytes()
}

pub(crate) fn decode_subscriber_key(bytes: &[u8]) -> Result<i64, AppError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| AppError::storage_read("subscriber key must be 8 bytes"))?;
    Ok(i64::from_le_bytes(raw))
}
