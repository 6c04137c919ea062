//! Analysis pipeline orchestrator.
//!
//! Composes discovery, plugins, the worker pool, and the rule/severity
//! managers into one run: discover files, fan plugin tasks out (parallel via
//! the pool, or in-process sequentially with per-file progress), aggregate
//! issues, score them, and emit the versioned result schema. The pipeline is
//! an explicitly constructed instance; whatever boundary component needs one
//! owns it.

pub mod events;
pub mod metrics;

pub use events::{EventBus, ListenerId};

use crate::config::EngineConfig;
use crate::core::{Error, Issue, IssueCounts, Result, Severity};
use crate::executor::{PoolStatus, Task, TaskResult, TaskRunner, WorkerPool};
use crate::plugins::{
    AnalyzerPlugin, DiscoveryPatterns, FileDiscovery, PatternAnalyzer, PluginSet, WalkerDiscovery,
};
use crate::rules::RuleRegistry;
use crate::schema::{
    AnalysisResultSchema, ConfigSnapshot, FileReport, PluginResult, PluginStatus, ResultSummary,
    RunStatus,
};
use crate::severity::SeverityManager;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle states of one pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Initializing,
    Initialized,
    Running,
    Completed,
    Failed,
    ShuttingDown,
    Shutdown,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Created => "created",
            PipelineState::Initializing => "initializing",
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
            PipelineState::ShuttingDown => "shutting_down",
            PipelineState::Shutdown => "shutdown",
        }
    }
}

/// Granular progress in sequential mode, invoked after every file.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub plugin: String,
    pub file: Option<PathBuf>,
    pub processed: usize,
    pub total: usize,
}

/// What one `analyze` call hands back. A run always returns this, never an
/// error: pipeline-level failures surface as `success == false` with a single
/// error string and an empty schema.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub success: bool,
    pub analysis_id: String,
    pub summary: ResultSummary,
    pub schema: AnalysisResultSchema,
    pub duration: std::time::Duration,
    pub errors: Vec<String>,
}

/// Runs tasks by dispatching to the plugin named inside each task.
struct PluginTaskRunner {
    plugins: Arc<PluginSet>,
}

impl TaskRunner for PluginTaskRunner {
    fn run(&self, task: &Task) -> anyhow::Result<Vec<Issue>> {
        let plugin = self
            .plugins
            .get(&task.plugin)
            .ok_or_else(|| Error::UnknownPlugin(task.plugin.clone()))?;
        plugin.analyze(&task.files)
    }
}

/// Assembles an `AnalysisPipeline` with injected collaborators.
pub struct PipelineBuilder {
    config: EngineConfig,
    plugins: PluginSet,
    discovery: Option<Arc<dyn FileDiscovery>>,
    rules: Option<RuleRegistry>,
    severity: SeverityManager,
}

impl PipelineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            plugins: PluginSet::new(),
            discovery: None,
            rules: None,
            severity: SeverityManager::default(),
        }
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn AnalyzerPlugin>) -> Self {
        self.plugins.register(plugin);
        self
    }

    /// Register the built-in analyzers.
    pub fn with_default_plugins(mut self) -> Self {
        self.plugins.register(Arc::new(PatternAnalyzer::new()));
        self
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn FileDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_severity(mut self, severity: SeverityManager) -> Self {
        self.severity = severity;
        self
    }

    /// Validate the configuration and produce the pipeline. This is the one
    /// place setup errors propagate as hard failures.
    pub fn build(self) -> Result<AnalysisPipeline> {
        self.config.validate()?;
        let mut rules = self.rules.unwrap_or_else(RuleRegistry::with_builtins);
        if !self.config.overrides.is_empty() {
            rules.apply_overrides(self.config.overrides.clone());
        }
        Ok(AnalysisPipeline {
            config: self.config,
            plugins: Arc::new(self.plugins),
            discovery: self
                .discovery
                .unwrap_or_else(|| Arc::new(WalkerDiscovery::new())),
            rules,
            severity: self.severity,
            events: EventBus::new(),
            pool: None,
            state: Mutex::new(PipelineState::Created),
            ready: Mutex::new(HashSet::new()),
            run_counter: AtomicU64::new(0),
        })
    }
}

/// The orchestrator. One instance per embedding component; construct through
/// `PipelineBuilder`.
pub struct AnalysisPipeline {
    config: EngineConfig,
    plugins: Arc<PluginSet>,
    discovery: Arc<dyn FileDiscovery>,
    rules: RuleRegistry,
    severity: SeverityManager,
    events: EventBus,
    pool: Option<WorkerPool>,
    state: Mutex<PipelineState>,
    /// Names of plugins whose `initialize` succeeded.
    ready: Mutex<HashSet<String>>,
    run_counter: AtomicU64,
}

impl AnalysisPipeline {
    pub fn builder(config: EngineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn pool_status(&self) -> Option<PoolStatus> {
        self.pool.as_ref().map(WorkerPool::status)
    }

    /// Boot the worker pool and initialize every selected plugin. A plugin
    /// whose `initialize` fails is excluded from runs but does not abort the
    /// pipeline.
    pub fn initialize(&mut self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != PipelineState::Created {
                return Err(Error::InvalidState(format!(
                    "initialize called in state '{}'",
                    state.as_str()
                )));
            }
            *state = PipelineState::Initializing;
        }
        self.events.emit(events::PIPELINE_INITIALIZING, json!({}));

        if self.config.parallel {
            let runner = Arc::new(PluginTaskRunner {
                plugins: Arc::clone(&self.plugins),
            });
            self.pool = Some(WorkerPool::new(
                self.config.max_workers,
                self.config.task_timeout(),
                runner,
            ));
        }

        for plugin in self.plugins.select(&self.config.plugins) {
            let meta = plugin.metadata();
            match plugin.initialize() {
                Ok(()) => {
                    self.ready.lock().insert(meta.name.clone());
                    self.events.emit(
                        events::PLUGIN_INITIALIZED,
                        json!({"plugin": meta.name, "version": meta.version}),
                    );
                }
                Err(error) => {
                    log::warn!("plugin '{}' failed to initialize: {error}", meta.name);
                    self.events.emit(
                        events::PLUGIN_ERROR,
                        json!({"plugin": meta.name, "error": error.to_string()}),
                    );
                }
            }
        }

        *self.state.lock() = PipelineState::Initialized;
        Ok(())
    }

    /// Run one analysis. Always returns a `PipelineRun`; see the type docs
    /// for the failure contract.
    pub fn analyze(&self, progress: Option<&dyn Fn(&ProgressUpdate)>) -> PipelineRun {
        let analysis_id = self.next_analysis_id();
        let started = Instant::now();

        {
            let mut state = self.state.lock();
            match *state {
                PipelineState::Initialized
                | PipelineState::Completed
                | PipelineState::Failed => *state = PipelineState::Running,
                other => {
                    return self.failed_run(
                        analysis_id,
                        started,
                        Error::InvalidState(format!(
                            "analyze called in state '{}'",
                            other.as_str()
                        )),
                    );
                }
            }
        }
        self.events
            .emit(events::ANALYSIS_STARTED, json!({"analysisId": analysis_id}));

        match self.run_inner(&analysis_id, progress) {
            Ok((summary, schema, errors)) => {
                *self.state.lock() = PipelineState::Completed;
                self.events.emit(
                    events::ANALYSIS_COMPLETED,
                    json!({
                        "analysisId": analysis_id,
                        "totalIssues": summary.total_issues,
                        "passed": summary.passed,
                    }),
                );
                PipelineRun {
                    success: true,
                    analysis_id,
                    summary,
                    schema,
                    duration: started.elapsed(),
                    errors,
                }
            }
            Err(error) => {
                *self.state.lock() = PipelineState::Failed;
                self.events.emit(
                    events::ANALYSIS_ERROR,
                    json!({"analysisId": analysis_id, "error": error.to_string()}),
                );
                self.failed_run(analysis_id, started, error)
            }
        }
    }

    /// Clean up plugins and terminate the pool. Callable from any state;
    /// idempotent in effect.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.state.lock();
            if *state == PipelineState::Shutdown {
                return;
            }
            *state = PipelineState::ShuttingDown;
        }
        for plugin in self.plugins.iter() {
            if let Err(error) = plugin.cleanup() {
                log::warn!(
                    "cleanup failed for plugin '{}': {error}",
                    plugin.metadata().name
                );
            }
        }
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
        *self.state.lock() = PipelineState::Shutdown;
        self.events.emit(events::PIPELINE_SHUTDOWN, json!({}));
    }

    fn next_analysis_id(&self) -> String {
        let sequence = self.run_counter.fetch_add(1, Ordering::Relaxed);
        format!("analysis-{}-{sequence}", Utc::now().format("%Y%m%dT%H%M%S"))
    }

    fn failed_run(
        &self,
        analysis_id: String,
        started: Instant,
        error: Error,
    ) -> PipelineRun {
        let schema = AnalysisResultSchema::empty(&analysis_id, self.config_snapshot());
        PipelineRun {
            success: false,
            analysis_id,
            summary: schema.summary.clone(),
            schema,
            duration: started.elapsed(),
            errors: vec![error.to_string()],
        }
    }

    fn config_snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            project_path: self.config.project_path.clone(),
            rule_sets: self.config.rule_sets.clone(),
            plugins: self
                .plugins
                .select(&self.config.plugins)
                .iter()
                .map(|p| p.metadata().name)
                .collect(),
            parallel: self.config.parallel,
            max_workers: self.config.max_workers,
            task_timeout_ms: self.config.task_timeout_ms,
        }
    }

    fn run_inner(
        &self,
        analysis_id: &str,
        progress: Option<&dyn Fn(&ProgressUpdate)>,
    ) -> Result<(ResultSummary, AnalysisResultSchema, Vec<String>)> {
        let patterns = DiscoveryPatterns::new(
            self.config.include_patterns.clone(),
            self.config.exclude_patterns.clone(),
        );
        let files = self
            .discovery
            .discover_files(&self.config.project_path, Some(&patterns))?;
        self.events.emit(
            events::ANALYSIS_FILES_DISCOVERED,
            json!({"analysisId": analysis_id, "count": files.len()}),
        );

        let ready = self.ready.lock().clone();
        let plugins: Vec<Arc<dyn AnalyzerPlugin>> = self
            .plugins
            .select(&self.config.plugins)
            .into_iter()
            .filter(|p| ready.contains(&p.metadata().name))
            .collect();

        let (issues, plugin_results) = if self.config.parallel {
            self.execute_parallel(analysis_id, &plugins, &files)?
        } else {
            self.execute_sequential(analysis_id, &plugins, &files, progress)
        };

        let issues = self.apply_rules(issues)?;

        let counts = IssueCounts::from_issues(&issues);
        let report = self.severity.check_thresholds(&counts);
        let escalations = self.severity.evaluate_escalations(&issues);
        let computed = metrics::compute_metrics(&issues, &self.severity);
        let recommendations = metrics::derive_recommendations(&issues, &report, &escalations);
        let file_reports = build_file_reports(&files, &issues, &plugin_results);
        let errors: Vec<String> = plugin_results
            .iter()
            .filter_map(|p| p.error.clone())
            .collect();

        let passed = !report.exceeded;
        let summary = ResultSummary {
            status: RunStatus::Success,
            total_issues: counts.total(),
            errors: counts.errors,
            warnings: counts.warnings,
            info: counts.info,
            files_analyzed: files.len(),
            plugins_run: plugin_results.len(),
            passed,
            exit_code: if passed { 0 } else { 1 },
        };
        let schema = AnalysisResultSchema::create(
            analysis_id,
            self.config_snapshot(),
            summary.clone(),
            file_reports,
            issues,
            computed,
            plugin_results,
            recommendations,
        );
        Ok((summary, schema, errors))
    }

    /// One task per plugin over the full file set, executed through the pool.
    /// Rejected tasks (timeout, crash) are resubmitted as fresh tasks up to
    /// `retry_attempts` times; pool shutdown aborts the run.
    fn execute_parallel(
        &self,
        analysis_id: &str,
        plugins: &[Arc<dyn AnalyzerPlugin>],
        files: &[PathBuf],
    ) -> Result<(Vec<Issue>, Vec<PluginResult>)> {
        let pool = self.pool.as_ref().ok_or_else(|| {
            Error::InvalidState("parallel mode requires initialize() first".to_string())
        })?;

        let tasks: Vec<Task> = plugins
            .iter()
            .map(|plugin| {
                let name = plugin.metadata().name;
                Task::new(format!("{analysis_id}:{name}"), name, files.to_vec())
            })
            .collect();
        let outcomes = pool.execute_tasks(tasks);

        let mut issues = Vec::new();
        let mut results = Vec::with_capacity(plugins.len());
        for (index, (plugin, first)) in plugins.iter().zip(outcomes).enumerate() {
            let name = plugin.metadata().name;
            let outcome = self.retry_rejections(pool, analysis_id, &name, files, first)?;
            let result = match outcome {
                Ok(task_result) => {
                    let result = plugin_result_from(&name, &task_result, files.len());
                    if task_result.success {
                        issues.extend(task_result.issues);
                    }
                    result
                }
                Err(rejection) => PluginResult {
                    name: name.clone(),
                    status: PluginStatus::Failed,
                    duration_ms: 0,
                    issues_found: 0,
                    files_processed: 0,
                    error: Some(rejection.to_string()),
                },
            };
            self.events.emit(
                events::ANALYSIS_PROGRESS,
                json!({
                    "analysisId": analysis_id,
                    "plugin": name,
                    "processed": index + 1,
                    "total": plugins.len(),
                }),
            );
            results.push(result);
        }
        Ok((issues, results))
    }

    /// Resubmit fresh tasks while the outcome is a retryable rejection.
    /// Pool shutdown propagates and fails the run.
    fn retry_rejections(
        &self,
        pool: &WorkerPool,
        analysis_id: &str,
        plugin: &str,
        files: &[PathBuf],
        first: Result<TaskResult>,
    ) -> Result<std::result::Result<TaskResult, Error>> {
        let mut outcome = first;
        let mut attempt = 0;
        loop {
            match outcome {
                Ok(result) => return Ok(Ok(result)),
                Err(error) if error.is_retryable() && attempt < self.config.retry_attempts => {
                    attempt += 1;
                    log::warn!(
                        "task for plugin '{plugin}' rejected ({error}); retry {attempt}/{}",
                        self.config.retry_attempts
                    );
                    let task = Task::new(
                        format!("{analysis_id}:{plugin}#retry-{attempt}"),
                        plugin,
                        files.to_vec(),
                    );
                    outcome = pool.execute_task(task);
                }
                Err(error @ Error::PoolShutdown { .. }) => return Err(error),
                Err(error) => return Ok(Err(error)),
            }
        }
    }

    /// Plugin-by-plugin, file-by-file, with monotonic per-file progress.
    fn execute_sequential(
        &self,
        analysis_id: &str,
        plugins: &[Arc<dyn AnalyzerPlugin>],
        files: &[PathBuf],
        progress: Option<&dyn Fn(&ProgressUpdate)>,
    ) -> (Vec<Issue>, Vec<PluginResult>) {
        let total = plugins.len() * files.len();
        let mut processed = 0;
        let mut issues = Vec::new();
        let mut results = Vec::with_capacity(plugins.len());

        for plugin in plugins {
            let name = plugin.metadata().name;
            let started = Instant::now();
            let mut found = Vec::new();
            let mut files_processed = 0;
            let mut error = None;

            for file in files {
                match plugin.analyze(std::slice::from_ref(file)) {
                    Ok(file_issues) => {
                        found.extend(file_issues);
                        files_processed += 1;
                    }
                    Err(plugin_error) => {
                        error = Some(plugin_error.to_string());
                        break;
                    }
                }
                processed += 1;
                if let Some(callback) = progress {
                    callback(&ProgressUpdate {
                        plugin: name.clone(),
                        file: Some(file.clone()),
                        processed,
                        total,
                    });
                }
                self.events.emit(
                    events::ANALYSIS_PROGRESS,
                    json!({
                        "analysisId": analysis_id,
                        "plugin": name,
                        "processed": processed,
                        "total": total,
                    }),
                );
            }
            // Keep the overall counter aligned when a plugin bails early.
            processed += files.len() - files_processed;

            let duration_ms = started.elapsed().as_millis() as u64;
            match error {
                Some(message) => results.push(PluginResult {
                    name,
                    status: PluginStatus::Failed,
                    duration_ms,
                    issues_found: 0,
                    files_processed,
                    error: Some(message),
                }),
                None => {
                    results.push(PluginResult {
                        name,
                        status: PluginStatus::Success,
                        duration_ms,
                        issues_found: found.len(),
                        files_processed,
                        error: None,
                    });
                    issues.extend(found);
                }
            }
        }
        (issues, results)
    }

    /// Overlay effective rule definitions on the aggregated issues: issues
    /// from disabled or silenced rules are dropped, and an issue adopts its
    /// rule's effective severity. Issues from rules the registry does not
    /// know pass through as emitted.
    fn apply_rules(&self, issues: Vec<Issue>) -> Result<Vec<Issue>> {
        let resolved = self
            .rules
            .get_resolved_rules(Some(&self.config.rule_sets))?;
        let by_id: HashMap<&str, &crate::rules::Rule> =
            resolved.iter().map(|rule| (rule.id.as_str(), rule)).collect();

        Ok(issues
            .into_iter()
            .filter_map(|issue| match by_id.get(issue.rule_id.as_str()) {
                Some(rule) => {
                    if !rule.enabled || rule.severity == Severity::Off {
                        return None;
                    }
                    Some(Issue {
                        severity: rule.severity,
                        ..issue
                    })
                }
                None => Some(issue),
            })
            .collect())
    }
}

fn plugin_result_from(name: &str, task_result: &TaskResult, files: usize) -> PluginResult {
    PluginResult {
        name: name.to_string(),
        status: if task_result.success {
            PluginStatus::Success
        } else {
            PluginStatus::Failed
        },
        duration_ms: task_result.duration.as_millis() as u64,
        issues_found: if task_result.success {
            task_result.issues.len()
        } else {
            0
        },
        files_processed: if task_result.success { files } else { 0 },
        error: task_result.error.clone(),
    }
}

/// Classify analyzed files: language by extension, per-file issue counts,
/// and attribution to the plugins that processed them.
fn build_file_reports(
    files: &[PathBuf],
    issues: &[Issue],
    plugin_results: &[PluginResult],
) -> Vec<FileReport> {
    let successful: Vec<String> = plugin_results
        .iter()
        .filter(|p| p.status == PluginStatus::Success)
        .map(|p| p.name.clone())
        .collect();

    let mut per_file: HashMap<&Path, usize> = HashMap::new();
    for issue in issues {
        *per_file.entry(issue.location.file.as_path()).or_default() += 1;
    }

    files
        .iter()
        .map(|path| FileReport {
            path: path.clone(),
            language: crate::core::Language::from_path(path),
            issues: per_file.get(path.as_path()).copied().unwrap_or(0),
            plugins: successful.clone(),
        })
        .collect()
}
