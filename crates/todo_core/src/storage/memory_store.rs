use crate::error::AppError;
use crate::model::{Task, TaskKey};
use crate::storage::{SubscriberStore, TaskStore};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<TaskKey, Vec<Task>>>,
    subscribers: RwLock<BTreeSet<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned_read() -> AppError {
    AppError::storage_read("memory store lock poisoned")
}

fn poisoned_write() -> AppError {
    AppError::storage_write("memory store lock poisoned")
}

impl TaskStore for MemoryStore {
    fn initialize(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn get(&self, key: &TaskKey) -> Result<Vec<Task>, AppError> {
        let tasks = self.tasks.read().map_err(|_| poisoned_read())?;
        Ok(tasks.get(key).cloned().unwrap_or_default())
    }

    fn put(&self, key: &TaskKey, tasks: &[Task]) -> Result<(), AppError> {
        let mut stored = self.tasks.write().map_err(|_| poisoned_write())?;
        stored.insert(*key, tasks.to_vec());
        Ok(())
    }

    fn modify(
        &self,
        key: &TaskKey,
        apply: &mut dyn FnMut(&mut Vec<Task>) -> Result<(), AppError>,
    ) -> Result<Vec<Task>, AppError> {
        let mut stored = self.tasks.write().map_err(|_| poisoned_write())?;
        let mut tasks = stored.get(key).cloned().unwrap_or_default();
        apply(&mut tasks)?;
        stored.insert(*key, tasks.clone());
        Ok(tasks)
    }
}

impl SubscriberStore for MemoryStore {
    fn remember_subscriber(&self, chat_id: i64) -> Result<(), AppError> {
        let mut subscribers = self.subscribers.write().map_err(|_| poisoned_write())?;
        subscribers.insert(chat_id);
        Ok(())
    }

    fn forget_subscriber(&self, chat_id: i64) -> Result<(), AppError> {
        let mut subscribers = self.subscribers.write().map_err(|_| poisoned_write())?;
        subscribers.remove(&chat_id);
        Ok(())
    }

    fn subscribers(&self) -> Result<Vec<i64>, AppError> {
        let subscribers = self.subscribers.read().map_err(|_| poisoned_read())?;
        Ok(subscribers.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::storage::test_support::exercise_store;

    #[test]
    fn memory_store_behaves_like_a_store() {
        exercise_store(&MemoryStore::new());
    }
}
