//! Rule resolution engine.
//!
//! Merges registered rule sets (following `extends` inheritance) and lazy
//! user overrides into the effective rule list for a run. Two precedence
//! guarantees hold: within one set, direct rules beat anything inherited
//! through `extends`; across the requested names, a later set overrides
//! same-id rules from an earlier one.

use super::{Rule, RuleSet};
use crate::config::{ConfigurationOverride, RuleOverride};
use crate::core::{Error, Result, Severity};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Overlay an override onto a base rule without touching the base.
pub fn effective_rule(base: &Rule, overlay: Option<&RuleOverride>) -> Rule {
    let mut rule = base.clone();
    if let Some(overlay) = overlay {
        if let Some(severity) = overlay.severity {
            rule.severity = severity;
        }
        if let Some(enabled) = overlay.enabled {
            rule.enabled = enabled;
        }
        if let Some(fragment) = &overlay.configuration {
            rule.configuration = Some(merge_configuration(rule.configuration.take(), fragment));
        }
    }
    rule
}

/// Shallow-merge an override fragment over the base configuration object.
fn merge_configuration(
    base: Option<serde_json::Value>,
    fragment: &serde_json::Value,
) -> serde_json::Value {
    match (base, fragment) {
        (Some(serde_json::Value::Object(mut base)), serde_json::Value::Object(fragment)) => {
            for (key, value) in fragment {
                base.insert(key.clone(), value.clone());
            }
            serde_json::Value::Object(base)
        }
        (_, fragment) => fragment.clone(),
    }
}

/// Registry of rule sets plus the override layer for one engine instance.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    sets: HashMap<String, RuleSet>,
    overrides: ConfigurationOverride,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in rule library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for set in super::builtin::builtin_rule_sets() {
            registry.register_rule_set(set);
        }
        registry
    }

    /// Register a rule set, replacing any previous set with the same name.
    pub fn register_rule_set(&mut self, set: RuleSet) {
        self.sets.insert(set.name.clone(), set);
    }

    pub fn rule_set(&self, name: &str) -> Option<&RuleSet> {
        self.sets.get(name)
    }

    pub fn rule_set_names(&self) -> Vec<&str> {
        self.sets.keys().map(String::as_str).collect()
    }

    /// Replace the whole override layer (from a `ConfigurationOverride`
    /// document supplied by the caller).
    pub fn apply_overrides(&mut self, overrides: ConfigurationOverride) {
        self.overrides = overrides;
    }

    pub fn enable_rule(&mut self, id: &str) {
        self.rule_override_mut(id).enabled = Some(true);
    }

    pub fn disable_rule(&mut self, id: &str) {
        self.rule_override_mut(id).enabled = Some(false);
    }

    pub fn update_rule_severity(&mut self, id: &str, severity: Severity) {
        self.rule_override_mut(id).severity = Some(severity);
    }

    pub fn update_rule_configuration(&mut self, id: &str, configuration: serde_json::Value) {
        self.rule_override_mut(id).configuration = Some(configuration);
    }

    /// Remove any override for a rule, restoring its base definition.
    pub fn clear_rule_override(&mut self, id: &str) {
        self.overrides.rules.remove(id);
    }

    pub fn enable_rule_set(&mut self, name: &str) {
        self.overrides
            .rule_sets
            .entry(name.to_string())
            .or_default()
            .enabled = Some(true);
    }

    pub fn disable_rule_set(&mut self, name: &str) {
        self.overrides
            .rule_sets
            .entry(name.to_string())
            .or_default()
            .enabled = Some(false);
    }

    fn rule_override_mut(&mut self, id: &str) -> &mut RuleOverride {
        self.overrides.rules.entry(id.to_string()).or_default()
    }

    fn rule_set_enabled(&self, name: &str) -> bool {
        self.overrides
            .rule_sets
            .get(name)
            .and_then(|o| o.enabled)
            .unwrap_or(true)
    }

    /// Look up a rule's base definition (first registered set defining it
    /// wins, in lexicographic set order for determinism) overlaid with any
    /// active override. Computed on read; base definitions are never mutated.
    pub fn get_rule(&self, id: &str) -> Option<Rule> {
        let ordered: BTreeMap<&String, &RuleSet> = self.sets.iter().collect();
        ordered
            .values()
            .flat_map(|set| set.rules.iter())
            .find(|rule| rule.id == id)
            .map(|base| effective_rule(base, self.overrides.rules.get(id)))
    }

    /// Resolve the requested rule sets (all registered sets when `None`)
    /// into the effective id-keyed rule list.
    pub fn get_resolved_rules(&self, names: Option<&[String]>) -> Result<Vec<Rule>> {
        let requested: Vec<String> = match names {
            Some(names) => names.to_vec(),
            None => {
                let mut all: Vec<String> = self.sets.keys().cloned().collect();
                all.sort();
                all
            }
        };

        // Insertion-ordered accumulation: later writes to the same id win.
        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, Rule> = HashMap::new();
        for name in &requested {
            let mut resolving = HashSet::new();
            self.resolve_into(name, &mut merged, &mut order, &mut resolving)?;
        }

        Ok(order
            .into_iter()
            .map(|id| {
                let base = &merged[&id];
                effective_rule(base, self.overrides.rules.get(&id))
            })
            .collect())
    }

    /// Resolved rules filtered to effective `enabled` and severity != off.
    pub fn get_enabled_rules(&self, names: Option<&[String]>) -> Result<Vec<Rule>> {
        Ok(self
            .get_resolved_rules(names)?
            .into_iter()
            .filter(|rule| rule.enabled && rule.severity != Severity::Off)
            .collect())
    }

    fn resolve_into(
        &self,
        name: &str,
        merged: &mut HashMap<String, Rule>,
        order: &mut Vec<String>,
        resolving: &mut HashSet<String>,
    ) -> Result<()> {
        // Disabled sets are skipped entirely, inherited rules included.
        if !self.rule_set_enabled(name) {
            return Ok(());
        }
        if !resolving.insert(name.to_string()) {
            return Err(Error::configuration(format!(
                "rule set extends cycle involving '{name}'"
            )));
        }

        let set = self
            .sets
            .get(name)
            .ok_or_else(|| Error::UnknownRuleSet(name.to_string()))?;

        // Depth-first: inherited rules land first so the set's own rules
        // overwrite them below.
        for parent in &set.extends {
            self.resolve_into(parent, merged, order, resolving)?;
        }
        for rule in &set.rules {
            if merged.insert(rule.id.clone(), rule.clone()).is_none() {
                order.push(rule.id.clone());
            }
        }

        resolving.remove(name);
        Ok(())
    }
}
