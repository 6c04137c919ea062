//! Metric computation over the aggregated issue set.

use crate::core::{Issue, IssueCounts, Severity};
use crate::schema::{AnalysisMetrics, ComplexityDistribution, RiskLevel};
use crate::severity::{Escalation, EscalationAction, SeverityManager, ThresholdReport};

/// Quality score degradation per finding.
const ERROR_PENALTY: f64 = 5.0;
const WARNING_PENALTY: f64 = 1.0;

pub fn compute_metrics(issues: &[Issue], severity: &SeverityManager) -> AnalysisMetrics {
    let counts = IssueCounts::from_issues(issues);
    AnalysisMetrics {
        quality_score: quality_score(&counts),
        security_risk: security_risk(issues),
        severity_score: severity.calculate_severity_score(&counts),
        complexity: complexity_distribution(issues),
    }
}

/// 100 minus a fixed weight per error/warning, floored at zero.
fn quality_score(counts: &IssueCounts) -> f64 {
    let penalty = counts.errors as f64 * ERROR_PENALTY + counts.warnings as f64 * WARNING_PENALTY;
    (100.0 - penalty).max(0.0)
}

/// High as soon as any error-severity, security-tagged issue exists; Medium
/// when security-tagged issues exist at lower severities.
fn security_risk(issues: &[Issue]) -> RiskLevel {
    let mut risk = RiskLevel::Low;
    for issue in issues {
        let security = issue.has_tag("security") || issue.category == "security";
        if !security {
            continue;
        }
        if issue.severity == Severity::Error {
            return RiskLevel::High;
        }
        risk = RiskLevel::Medium;
    }
    risk
}

/// Bucket complexity-category findings by severity.
fn complexity_distribution(issues: &[Issue]) -> ComplexityDistribution {
    let mut distribution = ComplexityDistribution::default();
    for issue in issues.iter().filter(|i| i.category == "complexity") {
        match issue.severity {
            Severity::Error => distribution.high += 1,
            Severity::Warning => distribution.medium += 1,
            Severity::Info => distribution.low += 1,
            Severity::Off => {}
        }
    }
    distribution
}

/// Human-readable follow-ups derived from the scored run.
pub fn derive_recommendations(
    issues: &[Issue],
    report: &ThresholdReport,
    escalations: &[Escalation],
) -> Vec<String> {
    let mut recommendations = Vec::new();

    for violation in &report.violations {
        recommendations.push(format!(
            "{} count {} exceeds the configured maximum of {}{}",
            violation.level,
            violation.count,
            violation.max_count,
            if violation.failing {
                " (fails the run)"
            } else {
                ""
            }
        ));
    }

    for escalation in escalations {
        let action = match &escalation.action {
            EscalationAction::EscalateTo(level) => format!("escalate to {level}"),
            EscalationAction::Notify => "notify".to_string(),
            EscalationAction::Block => "block".to_string(),
        };
        recommendations.push(format!(
            "escalation '{}' triggered by {} issue(s): {action}",
            escalation.rule, escalation.matched_issues
        ));
    }

    let fixable = issues.iter().filter(|i| i.fixable).count();
    if fixable > 0 {
        recommendations.push(format!("{fixable} issue(s) are auto-fixable"));
    }

    recommendations
}
