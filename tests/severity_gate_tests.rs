//! Threshold gating, escalation surfacing, and orchestrator-level retry.

use auditmap::config::EngineConfig;
use auditmap::core::{Issue, IssueCounts, IssueLocation, Severity};
use auditmap::pipeline::AnalysisPipeline;
use auditmap::plugins::{AnalyzerPlugin, PluginMetadata};
use auditmap::schema::PluginStatus;
use auditmap::severity::{
    EscalationAction, EscalationCondition, EscalationRule, SeverityManager, SeverityThreshold,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn default_error_threshold_gates_the_run() {
    let manager = SeverityManager::default();
    let report = manager.check_thresholds(&IssueCounts {
        errors: 1,
        warnings: 0,
        info: 0,
    });
    assert!(report.exceeded);
    assert!(report
        .violations
        .iter()
        .any(|v| v.level == Severity::Error && v.failing));
}

struct WarningSpammer;

impl AnalyzerPlugin for WarningSpammer {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new("spammer", "1.0.0", "emits three warnings per file")
    }

    fn analyze(&self, files: &[PathBuf]) -> anyhow::Result<Vec<Issue>> {
        Ok(files
            .iter()
            .flat_map(|file| {
                (1..=3).map(|line| {
                    Issue::new(
                        Severity::Warning,
                        "noisy finding",
                        "spam-rule",
                        "style",
                        IssueLocation::new(file.clone(), line, 1),
                    )
                })
            })
            .collect())
    }
}

fn one_file_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
    dir
}

#[test]
fn custom_thresholds_and_escalations_flow_into_the_summary() {
    let dir = one_file_project();
    let severity = SeverityManager::default()
        .with_thresholds(vec![SeverityThreshold {
            level: Severity::Warning,
            max_count: 2,
            fail_on_exceed: true,
        }])
        .with_escalations(vec![EscalationRule {
            name: "warning-flood".to_string(),
            condition: EscalationCondition::MinCount {
                level: Severity::Warning,
                count: 3,
            },
            action: EscalationAction::EscalateTo(Severity::Error),
        }]);

    let mut pipeline = AnalysisPipeline::builder(EngineConfig {
        max_workers: 2,
        ..EngineConfig::new(dir.path())
    })
    .with_plugin(Arc::new(WarningSpammer))
    .with_severity(severity)
    .build()
    .unwrap();
    pipeline.initialize().unwrap();

    let run = pipeline.analyze(None);
    assert!(run.success);
    assert_eq!(run.summary.warnings, 3);
    assert!(!run.summary.passed, "warning threshold of 2 gates the run");
    assert_eq!(run.summary.exit_code, 1);
    assert!(run
        .schema
        .recommendations
        .iter()
        .any(|r| r.contains("warning-flood")));
    assert!(run
        .schema
        .recommendations
        .iter()
        .any(|r| r.contains("exceeds the configured maximum")));

    pipeline.shutdown();
}

struct AlwaysHangs {
    attempts: Arc<AtomicUsize>,
}

impl AnalyzerPlugin for AlwaysHangs {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new("glacier", "1.0.0", "always exceeds the timeout")
    }

    fn analyze(&self, _files: &[PathBuf]) -> anyhow::Result<Vec<Issue>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(300));
        Ok(Vec::new())
    }
}

#[test]
fn rejected_tasks_are_retried_then_reported_once() {
    init_logging();
    let dir = one_file_project();
    let attempts = Arc::new(AtomicUsize::new(0));

    let config = EngineConfig {
        max_workers: 1,
        task_timeout_ms: 50,
        retry_attempts: 2,
        ..EngineConfig::new(dir.path())
    };
    let mut pipeline = AnalysisPipeline::builder(config)
        .with_plugin(Arc::new(AlwaysHangs {
            attempts: Arc::clone(&attempts),
        }))
        .build()
        .unwrap();
    pipeline.initialize().unwrap();

    let run = pipeline.analyze(None);
    assert!(run.success, "a timed-out plugin does not fail the run");

    // One failed report despite 1 + retry_attempts dispatches.
    let glacier: Vec<_> = run
        .schema
        .plugins
        .iter()
        .filter(|p| p.name == "glacier")
        .collect();
    assert_eq!(glacier.len(), 1);
    assert_eq!(glacier[0].status, PluginStatus::Failed);
    assert!(glacier[0].error.as_deref().unwrap().contains("timed out"));

    // Give abandoned workers time to run the handler before counting.
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    pipeline.shutdown();
}

#[test]
fn sequential_mode_reports_granular_progress() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.rs", "b.rs", "c.rs"] {
        std::fs::write(dir.path().join(name), "fn noop() {}\n").unwrap();
    }

    let config = EngineConfig {
        parallel: false,
        ..EngineConfig::new(dir.path())
    };
    let mut pipeline = AnalysisPipeline::builder(config)
        .with_plugin(Arc::new(WarningSpammer))
        .build()
        .unwrap();
    pipeline.initialize().unwrap();

    let updates: std::sync::Mutex<Vec<(usize, usize)>> = std::sync::Mutex::new(Vec::new());
    let callback = |update: &auditmap::pipeline::ProgressUpdate| {
        updates.lock().unwrap().push((update.processed, update.total));
    };
    let run = pipeline.analyze(Some(&callback));
    assert!(run.success);
    assert_eq!(run.summary.warnings, 9);

    let updates = updates.into_inner().unwrap();
    assert_eq!(updates, vec![(1, 3), (2, 3), (3, 3)]);

    pipeline.shutdown();
}

struct BrittlePlugin;

impl AnalyzerPlugin for BrittlePlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new("brittle", "1.0.0", "errors on the first file")
    }

    fn analyze(&self, _files: &[PathBuf]) -> anyhow::Result<Vec<Issue>> {
        anyhow::bail!("cannot open index")
    }
}

#[test]
fn sequential_progress_stays_monotonic_when_a_plugin_bails() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.rs", "b.rs", "c.rs"] {
        std::fs::write(dir.path().join(name), "fn noop() {}\n").unwrap();
    }

    let config = EngineConfig {
        parallel: false,
        ..EngineConfig::new(dir.path())
    };
    let mut pipeline = AnalysisPipeline::builder(config)
        .with_plugin(Arc::new(BrittlePlugin))
        .with_plugin(Arc::new(WarningSpammer))
        .build()
        .unwrap();
    pipeline.initialize().unwrap();

    let updates: std::sync::Mutex<Vec<(usize, usize)>> = std::sync::Mutex::new(Vec::new());
    let callback = |update: &auditmap::pipeline::ProgressUpdate| {
        updates.lock().unwrap().push((update.processed, update.total));
    };
    let run = pipeline.analyze(Some(&callback));
    assert!(run.success, "a failed plugin does not fail the run");

    let brittle = run
        .schema
        .plugins
        .iter()
        .find(|p| p.name == "brittle")
        .unwrap();
    assert_eq!(brittle.status, PluginStatus::Failed);
    assert_eq!(brittle.files_processed, 0);
    assert!(run.errors.iter().any(|e| e.contains("cannot open index")));
    assert_eq!(run.summary.warnings, 9, "the healthy plugin still runs");

    // The failing plugin's unprocessed files are counted toward the fixed
    // total, so the next plugin's updates continue from there.
    let updates = updates.into_inner().unwrap();
    assert_eq!(updates, vec![(4, 6), (5, 6), (6, 6)]);
    assert!(updates.windows(2).all(|w| w[0].0 < w[1].0));

    pipeline.shutdown();
}
