//! Shared error types for the engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for auditmap operations
#[derive(Debug, Error)]
pub enum Error {
    /// File system related errors
    #[error("File system error: {message}")]
    FileSystem {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Root path handed to file discovery does not exist
    #[error("Root path does not exist: {0}")]
    RootPathMissing(PathBuf),

    /// Configuration errors (invalid engine options, rule-set cycles, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A plugin reported a failure from initialize/analyze/cleanup
    #[error("Plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    /// Unknown plugin name referenced by a task or configuration
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    /// Unknown rule set name referenced during resolution
    #[error("Unknown rule set: {0}")]
    UnknownRuleSet(String),

    /// Task exceeded its timeout; the worker was replaced
    #[error("Task '{task_id}' timed out after {timeout_ms}ms")]
    TaskTimeout { task_id: String, timeout_ms: u64 },

    /// Worker running the task crashed; the worker was replaced
    #[error("Worker crashed while running task '{task_id}': {message}")]
    WorkerCrashed { task_id: String, message: String },

    /// Task rejected because the pool is shutting down
    #[error("Task '{task_id}' rejected: worker pool shut down")]
    PoolShutdown { task_id: String },

    /// Pipeline called in a state that does not permit the operation
    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    /// Schema validation errors when reconstructing untrusted input
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// Wrapped external errors
    #[error(transparent)]
    External(#[from] anyhow::Error),

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Pattern errors
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// Create a file system error with path context
    pub fn file_system(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::FileSystem {
            message: message.into(),
            path: Some(path.into()),
            source: None,
        }
    }

    /// Create a plugin error
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for the task rejections the orchestrator may retry
    /// (timeout and worker crash, not shutdown).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TaskTimeout { .. } | Error::WorkerCrashed { .. }
        )
    }
}

/// Result type alias using the engine error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TaskTimeout {
            task_id: "task-1".to_string(),
            timeout_ms: 30_000,
        };
        assert_eq!(err.to_string(), "Task 'task-1' timed out after 30000ms");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::TaskTimeout {
            task_id: "t".into(),
            timeout_ms: 1
        }
        .is_retryable());
        assert!(Error::WorkerCrashed {
            task_id: "t".into(),
            message: "panic".into()
        }
        .is_retryable());
        assert!(!Error::PoolShutdown { task_id: "t".into() }.is_retryable());
        assert!(!Error::Configuration("bad".into()).is_retryable());
    }
}
