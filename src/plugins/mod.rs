//! Plugin contract and built-in capabilities.
//!
//! Every analysis capability implements `AnalyzerPlugin`; the pipeline treats
//! them uniformly and never looks inside `analyze`. File discovery has its
//! own contract because it feeds the pipeline rather than producing issues.

pub mod discovery;
pub mod patterns;

pub use discovery::{DiscoveryPatterns, FileDiscovery, WalkerDiscovery};
pub use patterns::PatternAnalyzer;

use crate::core::Issue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Identity of a plugin, surfaced in execution reports and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl PluginMetadata {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// The uniform analysis capability contract.
///
/// A plugin is constructed once per pipeline, `initialize`d before use, and
/// `cleanup`ed at shutdown. It must be stateless across tasks except for
/// internal caches it manages itself; `analyze` may run on any worker thread.
pub trait AnalyzerPlugin: Send + Sync {
    fn metadata(&self) -> PluginMetadata;

    fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Analyze the given files and return findings. A returned error marks
    /// this plugin's result as failed without aborting the other plugins.
    fn analyze(&self, files: &[PathBuf]) -> anyhow::Result<Vec<Issue>>;

    fn cleanup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Name-keyed plugin collection shared between the pipeline and the pool's
/// task runner.
#[derive(Default)]
pub struct PluginSet {
    plugins: Vec<Arc<dyn AnalyzerPlugin>>,
    by_name: HashMap<String, usize>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin; a later plugin with the same name replaces the
    /// earlier registration.
    pub fn register(&mut self, plugin: Arc<dyn AnalyzerPlugin>) {
        let name = plugin.metadata().name;
        match self.by_name.get(&name) {
            Some(&index) => self.plugins[index] = plugin,
            None => {
                self.by_name.insert(name, self.plugins.len());
                self.plugins.push(plugin);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AnalyzerPlugin>> {
        self.by_name.get(name).map(|&index| &self.plugins[index])
    }

    /// Plugins in registration order, optionally filtered to enabled names.
    pub fn select(&self, enabled: &[String]) -> Vec<Arc<dyn AnalyzerPlugin>> {
        self.plugins
            .iter()
            .filter(|plugin| {
                enabled.is_empty() || enabled.iter().any(|n| *n == plugin.metadata().name)
            })
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AnalyzerPlugin>> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(&'static str);

    impl AnalyzerPlugin for Stub {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new(self.0, "1.0.0", "stub")
        }

        fn analyze(&self, _files: &[PathBuf]) -> anyhow::Result<Vec<Issue>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut set = PluginSet::new();
        set.register(Arc::new(Stub("ast")));
        set.register(Arc::new(Stub("llm")));
        assert_eq!(set.len(), 2);
        assert!(set.get("ast").is_some());
        assert!(set.get("missing").is_none());
    }

    #[test]
    fn test_same_name_replaces() {
        let mut set = PluginSet::new();
        set.register(Arc::new(Stub("ast")));
        set.register(Arc::new(Stub("ast")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_select_empty_means_all() {
        let mut set = PluginSet::new();
        set.register(Arc::new(Stub("ast")));
        set.register(Arc::new(Stub("dynamic")));
        assert_eq!(set.select(&[]).len(), 2);
        let only = set.select(&["dynamic".to_string()]);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].metadata().name, "dynamic");
    }

    #[test]
    fn test_default_lifecycle_hooks_succeed() {
        let stub = Stub("ast");
        assert!(stub.initialize().is_ok());
        assert!(stub.cleanup().is_ok());
    }
}
