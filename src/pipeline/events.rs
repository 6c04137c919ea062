//! Lifecycle event surface.
//!
//! Explicit observer registration instead of an ambient emitter; the event
//! names and payload shapes are a compatibility contract for external
//! consumers. Emission is synchronous and never blocks analysis: listeners
//! run inline and a panicking listener is contained and logged.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const PIPELINE_INITIALIZING: &str = "pipeline.initializing";
pub const PLUGIN_INITIALIZED: &str = "plugin.initialized";
pub const PLUGIN_ERROR: &str = "plugin.error";
pub const ANALYSIS_STARTED: &str = "analysis.started";
pub const ANALYSIS_FILES_DISCOVERED: &str = "analysis.files.discovered";
pub const ANALYSIS_PROGRESS: &str = "analysis.progress";
pub const ANALYSIS_COMPLETED: &str = "analysis.completed";
pub const ANALYSIS_ERROR: &str = "analysis.error";
pub const PIPELINE_SHUTDOWN: &str = "pipeline.shutdown";

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Name-keyed listener registry.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Callback)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove one listener; returns whether it was registered for `event`.
    pub fn unsubscribe(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.get_mut(event) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(entry_id, _)| *entry_id != id);
                before != entries.len()
            }
            None => false,
        }
    }

    pub fn emit(&self, event: &str, payload: Value) {
        let callbacks: Vec<Callback> = {
            let listeners = self.listeners.read();
            match listeners.get(event) {
                Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };
        for callback in callbacks {
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(&payload))).is_err() {
                log::warn!("event listener for '{event}' panicked");
            }
        }
    }
}
