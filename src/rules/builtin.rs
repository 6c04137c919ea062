//! Built-in rule library.
//!
//! Three category sets plus a `recommended` umbrella set that extends them.
//! These are the base definitions served to every engine instance; user
//! configuration is layered on top by the registry and never mutates them.

use super::{Rule, RuleSet};
use crate::core::Severity;
use once_cell::sync::Lazy;
use serde_json::json;

static BUILTIN_SETS: Lazy<Vec<RuleSet>> = Lazy::new(|| {
    vec![
        security_rules(),
        maintainability_rules(),
        complexity_rules(),
        RuleSet::new("recommended", "1.0.0").extending(&[
            "security",
            "maintainability",
            "complexity",
        ]),
    ]
});

/// All built-in rule sets, cloned for the caller's registry.
pub fn builtin_rule_sets() -> Vec<RuleSet> {
    BUILTIN_SETS.clone()
}

fn security_rules() -> RuleSet {
    RuleSet::new("security", "1.2.0").with_rules(vec![
        Rule::new("no-eval", "Disallow dynamic evaluation", "security", Severity::Error)
            .with_description("Dynamic code evaluation enables injection attacks")
            .with_tags(&["security", "injection"]),
        Rule::new(
            "no-hardcoded-secret",
            "Disallow hardcoded credentials",
            "security",
            Severity::Error,
        )
        .with_description("Credentials belong in a secret store, not source code")
        .with_tags(&["security", "credentials"]),
        Rule::new(
            "no-insecure-random",
            "Disallow non-cryptographic randomness in security contexts",
            "security",
            Severity::Warning,
        )
        .with_tags(&["security"]),
    ])
}

fn maintainability_rules() -> RuleSet {
    RuleSet::new("maintainability", "1.1.0").with_rules(vec![
        Rule::new("no-todo", "Flag TODO/FIXME markers", "maintainability", Severity::Warning)
            .with_description("Unresolved markers accumulate as technical debt")
            .with_tags(&["maintainability", "debt"]),
        Rule::new(
            "max-line-length",
            "Limit line length",
            "maintainability",
            Severity::Info,
        )
        .with_configuration(json!({"limit": 120}))
        .with_tags(&["maintainability", "style"])
        .fixable(),
    ])
}

fn complexity_rules() -> RuleSet {
    RuleSet::new("complexity", "1.0.0").with_rules(vec![
        Rule::new("deep-nesting", "Limit nesting depth", "complexity", Severity::Warning)
            .with_configuration(json!({"max_depth": 4}))
            .with_tags(&["complexity"]),
        Rule::new("max-file-length", "Limit file length", "complexity", Severity::Info)
            .with_configuration(json!({"max_lines": 1000}))
            .with_tags(&["complexity"]),
    ])
}
