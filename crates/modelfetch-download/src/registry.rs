//! Task registry.
//!
//! The single source of truth for task records. Tasks are kept in
//! submission order and are removed only on explicit request.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use modelfetch_core::{DownloadId, DownloadTask};

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<IndexMap<DownloadId, Arc<DownloadTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<DownloadId, Arc<DownloadTask>>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<DownloadId, Arc<DownloadTask>>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, task: Arc<DownloadTask>) {
        self.write().insert(task.id().clone(), task);
    }

    pub fn get(&self, id: &DownloadId) -> Option<Arc<DownloadTask>> {
        self.read().get(id).cloned()
    }

    /// All tasks in submission order.
    pub fn list(&self) -> Vec<Arc<DownloadTask>> {
        self.read().values().cloned().collect()
    }

    /// Non-terminal tasks in submission order.
    pub fn list_active(&self) -> Vec<Arc<DownloadTask>> {
        self.read()
            .values()
            .filter(|task| !task.is_terminal())
            .cloned()
            .collect()
    }

    pub fn remove(&self, id: &DownloadId) -> Option<Arc<DownloadTask>> {
        self.write().shift_remove(id)
    }

    /// Remove `id` only if the task is terminal.
    pub fn remove_if_terminal(&self, id: &DownloadId) -> bool {
        let mut tasks = self.write();
        match tasks.get(id) {
            Some(task) if task.is_terminal() => {
                tasks.shift_remove(id);
                true
            }
            _ => false,
        }
    }

    /// Remove every terminal task and return how many were removed.
    pub fn remove_terminal(&self) -> usize {
        let mut tasks = self.write();
        let before = tasks.len();
        tasks.retain(|_, task| !task.is_terminal());
        before - tasks.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
