//! Severity weighting, thresholds, and escalation.
//!
//! Maps the aggregated issue counts of one run to a pass/fail decision and a
//! single-number risk score. Thresholds and escalation rules are static
//! configuration evaluated per run; nothing here mutates during analysis.

use crate::core::{Issue, IssueCounts, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_error_weight() -> f64 {
    10.0
}

fn default_warning_weight() -> f64 {
    3.0
}

fn default_info_weight() -> f64 {
    1.0
}

/// Per-level cap on issue counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    pub level: Severity,
    pub max_count: usize,
    /// When true, exceeding this threshold fails the run.
    pub fail_on_exceed: bool,
}

/// One threshold that was exceeded in a run, failing or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdViolation {
    pub level: Severity,
    pub count: usize,
    pub max_count: usize,
    pub failing: bool,
}

/// Outcome of checking all thresholds against one run's counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    /// True when any fail-on-exceed threshold was exceeded.
    pub exceeded: bool,
    /// Every exceeded threshold, including report-only ones.
    pub violations: Vec<ThresholdViolation>,
}

/// Condition side of an escalation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCondition {
    /// Any issue produced by this rule id.
    RuleId(String),
    /// Any issue in this category.
    Category(String),
    /// Any issue carrying this tag.
    Tag(String),
    /// At least this many issues at the given level.
    MinCount { level: Severity, count: usize },
    /// The given level makes up at least this percentage of all issues.
    MinPercentage { level: Severity, percent: f64 },
}

/// Action side of an escalation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    EscalateTo(Severity),
    Notify,
    Block,
}

/// Condition -> action pair evaluated against the aggregated issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub name: String,
    pub condition: EscalationCondition,
    pub action: EscalationAction,
}

/// An escalation rule that fired for this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub rule: String,
    pub action: EscalationAction,
    pub matched_issues: usize,
}

/// Holds the three severity levels with weights plus a threshold per level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityManager {
    #[serde(default = "default_error_weight")]
    pub error_weight: f64,
    #[serde(default = "default_warning_weight")]
    pub warning_weight: f64,
    #[serde(default = "default_info_weight")]
    pub info_weight: f64,
    #[serde(default = "SeverityManager::default_thresholds")]
    pub thresholds: Vec<SeverityThreshold>,
    #[serde(default)]
    pub escalations: Vec<EscalationRule>,
}

impl Default for SeverityManager {
    fn default() -> Self {
        Self {
            error_weight: default_error_weight(),
            warning_weight: default_warning_weight(),
            info_weight: default_info_weight(),
            thresholds: Self::default_thresholds(),
            escalations: Vec::new(),
        }
    }
}

impl SeverityManager {
    /// Defaults: any error fails the run; warnings and info are report-only.
    fn default_thresholds() -> Vec<SeverityThreshold> {
        vec![
            SeverityThreshold {
                level: Severity::Error,
                max_count: 0,
                fail_on_exceed: true,
            },
            SeverityThreshold {
                level: Severity::Warning,
                max_count: 20,
                fail_on_exceed: false,
            },
            SeverityThreshold {
                level: Severity::Info,
                max_count: 100,
                fail_on_exceed: false,
            },
        ]
    }

    pub fn with_thresholds(mut self, thresholds: Vec<SeverityThreshold>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_escalations(mut self, escalations: Vec<EscalationRule>) -> Self {
        self.escalations = escalations;
        self
    }

    fn weight(&self, level: Severity) -> f64 {
        match level {
            Severity::Error => self.error_weight,
            Severity::Warning => self.warning_weight,
            Severity::Info => self.info_weight,
            Severity::Off => 0.0,
        }
    }

    /// Check every threshold against the run's counts.
    pub fn check_thresholds(&self, counts: &IssueCounts) -> ThresholdReport {
        let mut report = ThresholdReport::default();
        for threshold in &self.thresholds {
            let count = counts.get(threshold.level);
            if count > threshold.max_count {
                report.exceeded |= threshold.fail_on_exceed;
                report.violations.push(ThresholdViolation {
                    level: threshold.level,
                    count,
                    max_count: threshold.max_count,
                    failing: threshold.fail_on_exceed,
                });
            }
        }
        report
    }

    /// Weighted sum over counts, the run's single-number risk indicator.
    pub fn calculate_severity_score(&self, counts: &IssueCounts) -> f64 {
        Severity::ISSUE_LEVELS
            .iter()
            .map(|&level| counts.get(level) as f64 * self.weight(level))
            .sum()
    }

    /// Percentage of the total per level; empty when there are no issues.
    pub fn get_severity_distribution(&self, counts: &IssueCounts) -> HashMap<Severity, f64> {
        let total = counts.total();
        if total == 0 {
            return HashMap::new();
        }
        Severity::ISSUE_LEVELS
            .iter()
            .map(|&level| (level, counts.get(level) as f64 * 100.0 / total as f64))
            .collect()
    }

    /// Evaluate every escalation rule against the aggregated issues.
    pub fn evaluate_escalations(&self, issues: &[Issue]) -> Vec<Escalation> {
        let counts = IssueCounts::from_issues(issues);
        self.escalations
            .iter()
            .filter_map(|rule| {
                let matched = match &rule.condition {
                    EscalationCondition::RuleId(id) => {
                        issues.iter().filter(|i| &i.rule_id == id).count()
                    }
                    EscalationCondition::Category(category) => {
                        issues.iter().filter(|i| &i.category == category).count()
                    }
                    EscalationCondition::Tag(tag) => {
                        issues.iter().filter(|i| i.has_tag(tag)).count()
                    }
                    EscalationCondition::MinCount { level, count } => {
                        let have = counts.get(*level);
                        if have >= *count {
                            have
                        } else {
                            0
                        }
                    }
                    EscalationCondition::MinPercentage { level, percent } => {
                        let total = counts.total();
                        if total == 0 {
                            0
                        } else {
                            let have = counts.get(*level);
                            let share = have as f64 * 100.0 / total as f64;
                            if share >= *percent {
                                have
                            } else {
                                0
                            }
                        }
                    }
                };
                (matched > 0).then(|| Escalation {
                    rule: rule.name.clone(),
                    action: rule.action.clone(),
                    matched_issues: matched,
                })
            })
            .collect()
    }
}
