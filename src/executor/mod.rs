//! Bounded-concurrency task execution.
//!
//! `Task` and `TaskResult` are the executor's wire types; `WorkerPool` is the
//! only truly parallel component in the engine. The pool guarantees at most
//! one live attempt per dispatched task; retry composition is the
//! orchestrator's responsibility (it resubmits a fresh task).

pub mod pool;

pub use pool::WorkerPool;

use crate::core::Issue;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One unit of dispatchable plugin work. Immutable once queued; owned
/// exclusively by the executor until completion or cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique within one pipeline run.
    pub id: String,
    /// Name of the plugin that should process the files.
    pub plugin: String,
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub options: serde_json::Value,
    /// Per-task timeout overriding the pool default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Task {
    pub fn new(id: impl Into<String>, plugin: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            id: id.into(),
            plugin: plugin.into(),
            files,
            options: serde_json::Value::Null,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }
}

/// Outcome of one task, correlated by `task_id`. A plugin-level failure is a
/// completed task with `success == false`; pool-level rejections (timeout,
/// worker crash, shutdown) surface as `Err` from the executor instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration: Duration,
}

/// What workers actually execute. The pipeline implements this by looking up
/// the plugin named in the task; tests substitute their own runners.
pub trait TaskRunner: Send + Sync {
    fn run(&self, task: &Task) -> anyhow::Result<Vec<Issue>>;
}

impl<F> TaskRunner for F
where
    F: Fn(&Task) -> anyhow::Result<Vec<Issue>> + Send + Sync,
{
    fn run(&self, task: &Task) -> anyhow::Result<Vec<Issue>> {
        self(task)
    }
}

/// Pool introspection snapshot, for observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub total_workers: usize,
    pub available_workers: usize,
    pub in_flight: usize,
    pub queued: usize,
}
