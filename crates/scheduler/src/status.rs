//! Latest-run status reporting.
//!
//! External monitoring alerts on staleness or failure of named tasks; all
//! the core owes it is an upsert-by-task-name record on every exit path.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::store::JobStoreError;

/// Outcome of the latest run of a named task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub task: String,
    pub ran_at: DateTime<Utc>,
    pub succeeded: bool,
    pub detail: Option<String>,
}

impl TaskRun {
    pub fn success(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ran_at: Utc::now(),
            succeeded: true,
            detail: None,
        }
    }

    pub fn failure(task: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ran_at: Utc::now(),
            succeeded: false,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// "Record latest run of named task" collaborator.
pub trait TaskRunStore: Send + Sync {
    /// Upsert the record for `run.task`.
    fn record(&self, run: TaskRun) -> Result<(), JobStoreError>;

    /// Latest recorded run for a task, if any.
    fn latest(&self, task: &str) -> Result<Option<TaskRun>, JobStoreError>;
}

/// In-memory task-run store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryTaskRunStore {
    runs: RwLock<HashMap<String, TaskRun>>,
}

impl InMemoryTaskRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskRunStore for InMemoryTaskRunStore {
    fn record(&self, run: TaskRun) -> Result<(), JobStoreError> {
        self.runs.write().unwrap().insert(run.task.clone(), run);
        Ok(())
    }

    fn latest(&self, task: &str) -> Result<Option<TaskRun>, JobStoreError> {
        Ok(self.runs.read().unwrap().get(task).cloned())
    }
}

/// Run `f` and record its outcome under `task` on every exit path.
///
/// A failure to record is logged but never masks the task's own result.
pub fn run_with_status_report<T, E: std::fmt::Display>(
    task: &str,
    store: &dyn TaskRunStore,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let result = f();
    let run = match &result {
        Ok(_) => TaskRun::success(task),
        Err(e) => TaskRun::failure(task, e.to_string()),
    };
    if let Err(record_err) = store.record(run) {
        error!(task, error = %record_err, "failed to record task status");
    }
    result
}
