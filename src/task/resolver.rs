//! Task resolver: maps a command's task type to a fresh task instance.

use std::sync::Arc;

use dashmap::DashMap;

use super::command::TaskCommand;
use super::task::Task;
use crate::error::SubmitError;

/// Builds a task bound to one command.
pub type TaskFactoryFn = Arc<dyn Fn(&TaskCommand) -> Box<dyn Task> + Send + Sync>;

/// Registry of task factories keyed by task type.
pub struct TaskResolver {
    factories: DashMap<String, TaskFactoryFn>,
}

impl TaskResolver {
    /// Create a new, empty resolver.
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Register a factory under `task_type`, replacing any previous one.
    pub fn register<F, T>(&self, task_type: &str, factory: F)
    where
        F: Fn(&TaskCommand) -> T + Send + Sync + 'static,
        T: Task + 'static,
    {
        let factory_fn: TaskFactoryFn =
            Arc::new(move |command: &TaskCommand| Box::new(factory(command)) as Box<dyn Task>);

        if self
            .factories
            .insert(task_type.to_string(), factory_fn)
            .is_some()
        {
            tracing::warn!(task_type, "Replaced existing task registration");
        } else {
            tracing::debug!(task_type, "Registered task type");
        }
    }

    /// Resolve `command` to a new task instance bound to it.
    pub fn resolve(&self, command: &TaskCommand) -> Result<Box<dyn Task>, SubmitError> {
        command.validate()?;

        // Clone the factory out so the shard lock is not held while building.
        let factory = self
            .factories
            .get(&command.task_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SubmitError::TaskTypeNotRegistered {
                task_type: command.task_type.clone(),
            })?;

        Ok(factory(command))
    }

    /// Check if a task type is registered.
    pub fn has(&self, task_type: &str) -> bool {
        self.factories.contains_key(task_type)
    }

    /// List all registered task types.
    pub fn task_types(&self) -> Vec<String> {
        self.factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Get the number of registered task types.
    pub fn count(&self) -> usize {
        self.factories.len()
    }
}

impl Default for TaskResolver {
    fn default() -> Self {
        Self::new()
    }
}
