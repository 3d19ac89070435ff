//! Registry of in-flight task handles, keyed by task id.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tokio::sync::Notify;

use super::handle::SubmittedTaskHandle;
use crate::error::SubmitError;

/// Concurrent map of live handles.
///
/// Cloning shares the same map, so a registry can be injected into a runner
/// and inspected from outside it. Ids are single-use: once a handle has been
/// removed its id stays retired and cannot be inserted again.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    handles: Arc<DashMap<String, Arc<SubmittedTaskHandle>>>,
    retired: Arc<DashSet<String>>,
    emptied: Arc<Notify>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle, refusing an id that is live or already retired.
    pub fn insert(&self, handle: Arc<SubmittedTaskHandle>) -> Result<(), SubmitError> {
        match self.handles.entry(handle.task_id().to_string()) {
            Entry::Occupied(entry) => Err(SubmitError::DuplicateTaskId {
                task_id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                // `remove` retires before unmapping, so a vacant slot with a
                // finished id is always visible here.
                if self.retired.contains(entry.key()) {
                    return Err(SubmitError::DuplicateTaskId {
                        task_id: entry.key().clone(),
                    });
                }
                entry.insert(handle);
                Ok(())
            }
        }
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<SubmittedTaskHandle>> {
        self.handles
            .get(task_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a handle and retire its id.
    pub fn remove(&self, task_id: &str) -> Option<Arc<SubmittedTaskHandle>> {
        self.retired.insert(task_id.to_string());
        let removed = self.handles.remove(task_id).map(|(_, handle)| handle);
        if self.handles.is_empty() {
            self.emptied.notify_waiters();
        }
        removed
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.handles.contains_key(task_id)
    }

    /// Whether `task_id` belonged to a task that has left the registry.
    pub fn is_retired(&self, task_id: &str) -> bool {
        self.retired.contains(task_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.handles
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove and return every handle.
    pub fn drain(&self) -> Vec<Arc<SubmittedTaskHandle>> {
        let ids = self.task_ids();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Resolve once no handle is registered.
    pub async fn wait_empty(&self) {
        loop {
            let notified = self.emptied.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.handles.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
