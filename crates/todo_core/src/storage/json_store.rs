use crate::error::AppError;
use crate::model::{Task, TaskKey};
use crate::storage::{SubscriberStore, TaskStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    schema_version: u32,
    #[serde(default)]
    lists: Vec<StoredList>,
    #[serde(default)]
    subscribers: Vec<i64>,
}

impl Default for StoredDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            lists: Vec::new(),
            subscribers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredList {
    key: TaskKey,
    tasks: Vec<Task>,
}

impl StoredDocument {
    fn tasks(&self, key: &TaskKey) -> Vec<Task> {
        self.lists
            .iter()
            .find(|list| list.key == *key)
            .map(|list| list.tasks.clone())
            .unwrap_or_default()
    }

    fn set_tasks(&mut self, key: &TaskKey, tasks: Vec<Task>) {
        match self.lists.iter_mut().find(|list| list.key == *key) {
            Some(list) => list.tasks = tasks,
            None => self.lists.push(StoredList { key: *key, tasks }),
        }
    }
}

/// Whole-document JSON backend.
///
/// Every write replaces the file through a rename, so readers see either the
/// old or the new document. Writers are serialized by `write_lock`.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn update<T>(
        &self,
        apply: impl FnOnce(&mut StoredDocument) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::storage_write("json store lock poisoned"))?;
        let mut document = load_document(&self.path)?;
        let result = apply(&mut document)?;
        save_document(&self.path, &document)?;
        Ok(result)
    }
}

fn load_document(path: &Path) -> Result<StoredDocument, AppError> {
    if !path.exists() {
        return Ok(StoredDocument::default());
    }

    let content =
        std::fs::read_to_string(path).map_err(|err| AppError::storage_read(err.to_string()))?;
    let stored: StoredDocument =
        serde_json::from_str(&content).map_err(|err| AppError::storage_read(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::storage_read("schema_version mismatch"));
    }

    Ok(stored)
}

fn save_document(path: &Path, document: &StoredDocument) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::storage_write(err.to_string()))?;
    }

    let content = serde_json::to_string_pretty(document)
        .map_err(|err| AppError::storage_write(err.to_string()))?;
    let staging = staging_path(path);
    std::fs::write(&staging, content).map_err(|err| AppError::storage_write(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&staging, permissions)
            .map_err(|err| AppError::storage_write(err.to_string()))?;
    }

    std::fs::rename(&staging, path).map_err(|err| AppError::storage_write(err.to_string()))?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl TaskStore for JsonStore {
    fn initialize(&self) -> Result<(), AppError> {
        self.update(|_| Ok(()))
    }

    fn get(&self, key: &TaskKey) -> Result<Vec<Task>, AppError> {
        Ok(load_document(&self.path)?.tasks(key))
    }

    fn put(&self, key: &TaskKey, tasks: &[Task]) -> Result<(), AppError> {
        self.update(|document| {
            document.set_tasks(key, tasks.to_vec());
            Ok(())
        })
    }

    fn modify(
        &self,
        key: &TaskKey,
        apply: &mut dyn FnMut(&mut Vec<Task>) -> Result<(), AppError>,
    ) -> Result<Vec<Task>, AppError> {
        self.update(|document| {
            let mut tasks = document.tasks(key);
            apply(&mut tasks)?;
            document.set_tasks(key, tasks.clone());
            Ok(tasks)
        })
    }
}

impl SubscriberStore for JsonStore {
    fn remember_subscriber(&self, chat_id: i64) -> Result<(), AppError> {
        self.update(|document| {
            if !document.subscribers.contains(&chat_id) {
                document.subscribers.push(chat_id);
            }
            Ok(())
        })
    }

    fn forget_subscriber(&self, chat_id: i64) -> Result<(), AppError> {
        self.update(|document| {
            document.subscribers.retain(|id| *id != chat_id);
            Ok(())
        })
    }

    fn subscribers(&self) -> Result<Vec<i64>, AppError> {
        Ok(load_document(&self.path)?.subscribers)
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonStore, SCHEMA_VERSION, staging_path};
    use crate::model::Task;
    use crate::storage::test_support::{exercise_store, key, temp_path};
    use crate::storage::{SubscriberStore, TaskStore};
    use std::fs;

    #[test]
    fn json_store_behaves_like_a_store() {
        let path = temp_path("store.json");
        exercise_store(&JsonStore::new(&path));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn initialize_creates_document() {
        let path = temp_path("init.json");
        let store = JsonStore::new(&path);
        store.initialize().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).ok();

        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
    }

    #[test]
    fn contents_survive_reopen() {
        let path = temp_path("reopen.json");
        {
            let store = JsonStore::new(&path);
            store.append(&key(1, 15), Task::new("Learn Go")).unwrap();
            store.remember_subscriber(1).unwrap();
        }

        let reopened = JsonStore::new(&path);
        let tasks = reopened.get(&key(1, 15)).unwrap();
        let subscribers = reopened.subscribers().unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(tasks, vec![Task::new("Learn Go")]);
        assert_eq!(subscribers, vec![1]);
    }

    #[test]
    fn writes_leave_no_staging_file() {
        let path = temp_path("staging.json");
        let store = JsonStore::new(&path);
        store.put(&key(1, 15), &[Task::new("a")]).unwrap();
        let staging_exists = staging_path(&path).exists();
        fs::remove_file(&path).ok();

        assert!(!staging_exists);
    }

    #[test]
    fn corrupt_document_is_a_read_error() {
        let path = temp_path("corrupt.json");
        fs::write(&path, "{ invalid json ").unwrap();
        let err = JsonStore::new(&path).get(&key(1, 15)).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "storage_read");
    }

    #[test]
    fn schema_version_must_match() {
        let path = temp_path("bad-schema.json");
        let bad = format!(
            "{{\n  \"schema_version\": {},\n  \"lists\": []\n}}",
            SCHEMA_VERSION + 1
        );
        fs::write(&path, bad).unwrap();
        let err = JsonStore::new(&path).subscribers().unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "storage_read");
    }

    #[test]
    fn failed_write_reports_storage_write() {
        let dir = temp_path("not-a-dir");
        fs::write(&dir, "file in the way").unwrap();
        let store = JsonStore::new(&dir.join("store.json"));
        let err = store.put(&key(1, 15), &[Task::new("a")]).unwrap_err();
        fs::remove_file(&dir).ok();

        assert_eq!(err.code(), "storage_write");
    }

    #[cfg(unix)]
    #[test]
    fn document_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("perms.json");
        JsonStore::new(&path).initialize().unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        fs::remove_file(&path).ok();

        assert_eq!(mode & 0o777, 0o600);
    }
}
