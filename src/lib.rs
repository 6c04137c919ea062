// Export modules for library usage
pub mod config;
pub mod core;
pub mod executor;
pub mod pipeline;
pub mod plugins;
pub mod rules;
pub mod schema;
pub mod severity;

// Re-export commonly used types
pub use crate::core::{
    Error, Issue, IssueCounts, IssueLocation, Language, Result, Severity,
};

pub use crate::config::{ConfigurationOverride, EngineConfig, RuleOverride, RuleSetOverride};

pub use crate::executor::{PoolStatus, Task, TaskResult, TaskRunner, WorkerPool};

pub use crate::pipeline::{
    AnalysisPipeline, EventBus, ListenerId, PipelineBuilder, PipelineRun, PipelineState,
    ProgressUpdate,
};

pub use crate::plugins::{
    AnalyzerPlugin, DiscoveryPatterns, FileDiscovery, PatternAnalyzer, PluginMetadata, PluginSet,
    WalkerDiscovery,
};

pub use crate::rules::{Rule, RuleRegistry, RuleSet};

pub use crate::schema::{
    AnalysisMetrics, AnalysisResultSchema, ConfigSnapshot, FileReport, PluginResult, PluginStatus,
    ResultSummary, RiskLevel, RunStatus,
};

pub use crate::severity::{
    Escalation, EscalationAction, EscalationCondition, EscalationRule, SeverityManager,
    SeverityThreshold, ThresholdReport, ThresholdViolation,
};
