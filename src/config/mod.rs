//! Engine configuration.
//!
//! `EngineConfig` carries the options consumed from an external config
//! loader: project root, include/exclude patterns, enabled plugins and rule
//! sets, worker-pool sizing and timeout, and the parallel-execution flag.
//! A `.auditmap.toml` found in the project directory hierarchy supplies the
//! same fields.

pub mod loader;
pub mod overrides;

pub use loader::load_config;
pub use overrides::{ConfigurationOverride, RuleOverride, RuleSetOverride};

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_include_patterns() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_rule_sets() -> Vec<String> {
    vec!["recommended".to_string()]
}

/// Default worker count: CPU count minus one, at least one.
fn default_max_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

fn default_task_timeout_ms() -> u64 {
    30_000
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_parallel() -> bool {
    true
}

/// Options for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root of the project to analyze.
    pub project_path: PathBuf,

    /// Glob patterns selecting candidate files (default: everything).
    #[serde(default = "default_include_patterns")]
    pub include_patterns: Vec<String>,

    /// Glob patterns excluded from discovery.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Names of enabled analysis plugins; empty means all registered plugins.
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Rule sets resolved for scoring, in precedence order (later wins).
    #[serde(default = "default_rule_sets")]
    pub rule_sets: Vec<String>,

    /// Worker pool size (default: CPU count - 1).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-task timeout in milliseconds (default: 30s).
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Resubmission attempts for tasks rejected by timeout or worker crash.
    /// Retry happens in the orchestrator, never inside the pool.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Execute plugin tasks through the worker pool (default) or in-process
    /// sequentially with per-file progress.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Rule and rule-set overrides applied lazily at resolution time.
    #[serde(default)]
    pub overrides: ConfigurationOverride,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_path: PathBuf::from("."),
            include_patterns: default_include_patterns(),
            exclude_patterns: Vec::new(),
            plugins: Vec::new(),
            rule_sets: default_rule_sets(),
            max_workers: default_max_workers(),
            task_timeout_ms: default_task_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            parallel: default_parallel(),
            overrides: ConfigurationOverride::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            ..Default::default()
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    /// Validate the options before any analysis starts. Invalid configuration
    /// is the one setup error that propagates to the caller as a hard failure.
    pub fn validate(&self) -> Result<()> {
        if self.project_path.as_os_str().is_empty() {
            return Err(Error::configuration("project_path must not be empty"));
        }
        if self.max_workers == 0 {
            return Err(Error::configuration("max_workers must be at least 1"));
        }
        if self.task_timeout_ms == 0 {
            return Err(Error::configuration("task_timeout_ms must be positive"));
        }
        for pattern in self.include_patterns.iter().chain(&self.exclude_patterns) {
            glob::Pattern::new(pattern)
                .map_err(|e| Error::configuration(format!("invalid pattern '{pattern}': {e}")))?;
        }
        Ok(())
    }
}
