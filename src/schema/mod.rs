//! Versioned analysis result schema.
//!
//! The only object crossing the pipeline's output boundary. Created once per
//! run, immutable afterwards; `from_json` validates untrusted input before
//! reconstruction, while schemas built from a live run are trusted.

pub mod validator;

use crate::core::{Issue, IssueCounts, Language, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SCHEMA_VERSION: &str = "1.0.0";
pub const SCHEMA_URL: &str = "https://auditmap.dev/schemas/analysis-result/v1.json";

/// Terminal status of one plugin's execution within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Success,
    Failed,
}

/// Per-plugin execution report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginResult {
    pub name: String,
    pub status: PluginStatus,
    pub duration_ms: u64,
    pub issues_found: usize,
    pub files_processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One analyzed file with language classification and plugin attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub language: Language,
    pub issues: usize,
    pub plugins: Vec<String>,
}

/// Overall status of the run itself (not of the quality gate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Run summary: counts, status, gate decision, exit code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub status: RunStatus,
    pub total_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub files_analyzed: usize,
    pub plugins_run: usize,
    /// Quality gate decision from the severity thresholds.
    pub passed: bool,
    pub exit_code: i32,
}

impl ResultSummary {
    pub fn failed() -> Self {
        Self {
            status: RunStatus::Failed,
            total_issues: 0,
            errors: 0,
            warnings: 0,
            info: 0,
            files_analyzed: 0,
            plugins_run: 0,
            passed: false,
            exit_code: 1,
        }
    }
}

/// Coarse security risk classification for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Distribution of complexity-category findings by severity bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

/// Computed metrics over the aggregated issue set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    /// 0..=100, degraded by a fixed weight per error/warning.
    pub quality_score: f64,
    pub security_risk: RiskLevel,
    /// Weighted severity sum from the severity manager.
    pub severity_score: f64,
    pub complexity: ComplexityDistribution,
}

impl Default for AnalysisMetrics {
    fn default() -> Self {
        Self {
            quality_score: 100.0,
            security_risk: RiskLevel::Low,
            severity_score: 0.0,
            complexity: ComplexityDistribution::default(),
        }
    }
}

/// Snapshot of the options a run was executed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub project_path: PathBuf,
    pub rule_sets: Vec<String>,
    pub plugins: Vec<String>,
    pub parallel: bool,
    pub max_workers: usize,
    pub task_timeout_ms: u64,
}

/// The versioned result artifact of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResultSchema {
    pub schema_version: String,
    pub schema_url: String,
    pub timestamp: DateTime<Utc>,
    pub analysis_id: String,
    pub configuration: ConfigSnapshot,
    pub summary: ResultSummary,
    pub files: Vec<FileReport>,
    pub issues: Vec<Issue>,
    pub metrics: AnalysisMetrics,
    pub plugins: Vec<PluginResult>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl AnalysisResultSchema {
    /// Assemble a schema from a live run's parts.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        analysis_id: impl Into<String>,
        configuration: ConfigSnapshot,
        summary: ResultSummary,
        files: Vec<FileReport>,
        issues: Vec<Issue>,
        metrics: AnalysisMetrics,
        plugins: Vec<PluginResult>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            schema_url: SCHEMA_URL.to_string(),
            timestamp: Utc::now(),
            analysis_id: analysis_id.into(),
            configuration,
            summary,
            files,
            issues,
            metrics,
            plugins,
            recommendations,
        }
    }

    /// Placeholder schema for a failed run: zero issues, empty metrics.
    pub fn empty(analysis_id: impl Into<String>, configuration: ConfigSnapshot) -> Self {
        Self::create(
            analysis_id,
            configuration,
            ResultSummary::failed(),
            Vec::new(),
            Vec::new(),
            AnalysisMetrics::default(),
            Vec::new(),
            Vec::new(),
        )
    }

    pub fn issue_counts(&self) -> IssueCounts {
        IssueCounts::from_issues(&self.issues)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Reconstruct from untrusted input. Structural validation runs first;
    /// this is the only place schema validation failures are raised.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        validator::validate(&value)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
            project_path: PathBuf::from("/src/app"),
            rule_sets: vec!["recommended".to_string()],
            plugins: vec!["patterns".to_string()],
            parallel: true,
            max_workers: 4,
            task_timeout_ms: 30_000,
        }
    }

    #[test]
    fn test_empty_schema_reports_failed_summary() {
        let schema = AnalysisResultSchema::empty("run-1", snapshot());
        assert_eq!(schema.summary.status, RunStatus::Failed);
        assert!(schema.issues.is_empty());
        assert_eq!(schema.metrics.quality_score, 100.0);
        assert_eq!(schema.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_round_trip_is_validator_clean() {
        let schema = AnalysisResultSchema::empty("run-2", snapshot());
        let json = schema.to_json().unwrap();
        let restored = AnalysisResultSchema::from_json(&json).unwrap();
        assert_eq!(schema, restored);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(AnalysisResultSchema::from_json("{}").is_err());
        assert!(AnalysisResultSchema::from_json("not json").is_err());
    }
}
