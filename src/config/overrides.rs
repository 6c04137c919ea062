//! User configuration overrides.
//!
//! Overrides never mutate base rule definitions; the registry applies them
//! lazily at read time so one base rule library can serve many independently
//! configured engine instances.

use crate::core::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-rule override fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<serde_json::Value>,
}

impl RuleOverride {
    pub fn severity(severity: Severity) -> Self {
        Self {
            severity: Some(severity),
            ..Default::default()
        }
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.severity.is_none() && self.enabled.is_none() && self.configuration.is_none()
    }
}

/// Per-rule-set override fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSetOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Override document supplied by the caller:
/// `{ rules: {id: {severity, enabled, configuration}}, rule_sets: {name: {enabled}} }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationOverride {
    #[serde(default)]
    pub rules: HashMap<String, RuleOverride>,
    #[serde(default, alias = "ruleSets")]
    pub rule_sets: HashMap<String, RuleSetOverride>,
}

impl ConfigurationOverride {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.rule_sets.is_empty()
    }
}
