//! End-to-end orchestration scenario: three plugins, two files, a bounded
//! pool, and one plugin that exceeds the task timeout.

use auditmap::config::EngineConfig;
use auditmap::core::{Issue, IssueLocation, Severity};
use auditmap::pipeline::{events, AnalysisPipeline};
use auditmap::plugins::{AnalyzerPlugin, PluginMetadata};
use auditmap::schema::{PluginStatus, RunStatus};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct EmittingPlugin {
    name: &'static str,
    severity: Severity,
}

impl AnalyzerPlugin for EmittingPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(self.name, "1.0.0", "emits one issue per file")
    }

    fn analyze(&self, files: &[PathBuf]) -> anyhow::Result<Vec<Issue>> {
        Ok(files
            .iter()
            .map(|file| {
                Issue::new(
                    self.severity,
                    format!("{} finding", self.name),
                    format!("{}-rule", self.name),
                    "test",
                    IssueLocation::new(file.clone(), 1, 1),
                )
            })
            .collect())
    }
}

struct HangingPlugin;

impl AnalyzerPlugin for HangingPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new("llm", "1.0.0", "never answers in time")
    }

    fn analyze(&self, _files: &[PathBuf]) -> anyhow::Result<Vec<Issue>> {
        std::thread::sleep(Duration::from_millis(400));
        Ok(Vec::new())
    }
}

fn two_file_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ts"), "export const a = 1;\n").unwrap();
    std::fs::write(dir.path().join("b.ts"), "export const b = 2;\n").unwrap();
    dir
}

fn scenario_config(root: &Path) -> EngineConfig {
    EngineConfig {
        max_workers: 2,
        task_timeout_ms: 80,
        retry_attempts: 1,
        rule_sets: vec!["recommended".to_string()],
        ..EngineConfig::new(root)
    }
}

#[test]
fn timed_out_plugin_fails_in_isolation() {
    init_logging();
    let dir = two_file_project();
    let mut pipeline = AnalysisPipeline::builder(scenario_config(dir.path()))
        .with_plugin(Arc::new(EmittingPlugin {
            name: "ast",
            severity: Severity::Warning,
        }))
        .with_plugin(Arc::new(EmittingPlugin {
            name: "dynamic",
            severity: Severity::Info,
        }))
        .with_plugin(Arc::new(HangingPlugin))
        .build()
        .unwrap();
    pipeline.initialize().unwrap();

    let run = pipeline.analyze(None);
    assert!(run.success);
    assert_eq!(run.summary.status, RunStatus::Success);

    let plugins = &run.schema.plugins;
    assert_eq!(plugins.len(), 3);

    let llm = plugins.iter().find(|p| p.name == "llm").unwrap();
    assert_eq!(llm.status, PluginStatus::Failed);
    assert!(llm.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(llm.issues_found, 0);

    for name in ["ast", "dynamic"] {
        let result = plugins.iter().find(|p| p.name == name).unwrap();
        assert_eq!(result.status, PluginStatus::Success, "{name} should pass");
        assert_eq!(result.issues_found, 2);
        assert_eq!(result.files_processed, 2);
    }

    // Issues from the two healthy plugins survive aggregation: 2 files x 2.
    assert_eq!(run.summary.total_issues, 4);
    assert_eq!(run.summary.warnings, 2);
    assert_eq!(run.summary.info, 2);
    assert_eq!(run.summary.errors, 0);
    assert!(run.summary.passed, "warnings alone do not fail the gate");
    assert_eq!(run.summary.exit_code, 0);
    assert_eq!(run.summary.files_analyzed, 2);

    pipeline.shutdown();
}

#[test]
fn lifecycle_events_fire_in_order() {
    let dir = two_file_project();
    let mut pipeline = AnalysisPipeline::builder(scenario_config(dir.path()))
        .with_plugin(Arc::new(EmittingPlugin {
            name: "ast",
            severity: Severity::Info,
        }))
        .build()
        .unwrap();

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    for event in [
        events::PIPELINE_INITIALIZING,
        events::PLUGIN_INITIALIZED,
        events::ANALYSIS_STARTED,
        events::ANALYSIS_FILES_DISCOVERED,
        events::ANALYSIS_COMPLETED,
        events::PIPELINE_SHUTDOWN,
    ] {
        let seen = Arc::clone(&seen);
        pipeline.events().subscribe(event, move |_| {
            seen.lock().unwrap().push(event.to_string());
        });
    }

    pipeline.initialize().unwrap();
    let run = pipeline.analyze(None);
    assert!(run.success);
    pipeline.shutdown();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            "pipeline.initializing",
            "plugin.initialized",
            "analysis.started",
            "analysis.files.discovered",
            "analysis.completed",
            "pipeline.shutdown",
        ]
    );
}

#[test]
fn discovery_failure_fails_the_whole_run() {
    init_logging();
    let missing = PathBuf::from("/definitely/not/a/project");
    let mut pipeline = AnalysisPipeline::builder(scenario_config(&missing))
        .with_default_plugins()
        .build()
        .unwrap();
    pipeline.initialize().unwrap();

    let error_events = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&error_events);
    pipeline.events().subscribe(events::ANALYSIS_ERROR, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let run = pipeline.analyze(None);
    assert!(!run.success);
    assert_eq!(run.summary.status, RunStatus::Failed);
    assert_eq!(run.errors.len(), 1);
    assert!(run.errors[0].contains("Root path does not exist"));
    assert!(run.schema.issues.is_empty());
    assert!(run.schema.files.is_empty());
    assert_eq!(error_events.load(Ordering::SeqCst), 1);
}

#[test]
fn builtin_pattern_plugin_flags_seeded_problems() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("app.js"),
        "// TODO: rotate keys\nconst token = \"abcd1234efgh\";\n",
    )
    .unwrap();

    let mut config = scenario_config(dir.path());
    config.task_timeout_ms = 5_000;
    let mut pipeline = AnalysisPipeline::builder(config)
        .with_default_plugins()
        .build()
        .unwrap();
    pipeline.initialize().unwrap();

    let run = pipeline.analyze(None);
    assert!(run.success);
    assert_eq!(run.summary.errors, 1, "hardcoded secret");
    assert_eq!(run.summary.warnings, 1, "todo marker");
    assert!(!run.summary.passed, "an error-severity finding fails the gate");
    assert_eq!(run.summary.exit_code, 1);

    // Error-severity, security-tagged issue escalates the computed risk.
    assert_eq!(run.schema.metrics.security_risk, auditmap::schema::RiskLevel::High);
    assert!(run.schema.metrics.quality_score < 100.0);

    pipeline.shutdown();
}
