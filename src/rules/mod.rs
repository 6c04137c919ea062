//! Declarative rule and rule-set definitions.
//!
//! Base definitions are immutable; all user configuration is layered on top
//! by the registry at read time (see `registry::effective_rule`).

pub mod builtin;
pub mod registry;

pub use registry::RuleRegistry;

use crate::core::{Language, Severity};
use serde::{Deserialize, Serialize};

/// A named, configurable detection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub fixable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Free-form per-rule configuration fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<serde_json::Value>,
    /// Languages the rule applies to; `None` means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<Language>>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: category.into(),
            severity,
            enabled: true,
            fixable: false,
            tags: Vec::new(),
            configuration: None,
            languages: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_configuration(mut self, configuration: serde_json::Value) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }

    pub fn applies_to(&self, language: Language) -> bool {
        match &self.languages {
            Some(languages) => languages.contains(&language),
            None => true,
        }
    }
}

/// A named, versioned bundle of rules, optionally extending other sets.
///
/// The `extends` graph must be acyclic; resolution reports a configuration
/// error when a cycle is encountered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            rules: Vec::new(),
            extends: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn extending(mut self, extends: &[&str]) -> Self {
        self.extends = extends.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_builder() {
        let rule = Rule::new("no-eval", "Disallow eval", "security", Severity::Error)
            .with_tags(&["security", "injection"])
            .fixable();
        assert!(rule.enabled);
        assert!(rule.fixable);
        assert!(rule.applies_to(Language::Python));
    }

    #[test]
    fn test_language_applicability() {
        let mut rule = Rule::new("rs-only", "Rust only", "style", Severity::Info);
        rule.languages = Some(vec![Language::Rust]);
        assert!(rule.applies_to(Language::Rust));
        assert!(!rule.applies_to(Language::Python));
    }
}
