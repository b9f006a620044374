//! Run context: the mutable, run-scoped mapping templates resolve against.
//!
//! One context exists per run, owned exclusively by that run's call stack
//! and passed explicitly; it is never shared across concurrent runs.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

use crate::engine::state::StepStatus;

/// Record of one completed step (successfully or not).
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub output: Value,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(output: Value, status: StepStatus) -> Self {
        Self {
            output,
            status,
            timestamp: Utc::now(),
        }
    }

    fn to_value(&self) -> Value {
        serde_json::json!({
            "output": self.output,
            "status": self.status.to_string(),
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}

/// Scope exposed as `loop.*` while inside one loop iteration.
#[derive(Debug, Clone)]
pub struct LoopScope {
    pub item: Value,
    pub index: usize,
    pub total: usize,
}

impl LoopScope {
    fn to_value(&self) -> Value {
        serde_json::json!({
            "item": self.item,
            "index": self.index,
            "total": self.total,
        })
    }
}

/// The run-scoped resolution context.
///
/// Invariant: `steps` contains an entry for a step name if and only if
/// that step has completed in the current run; templates referencing a
/// not-yet-executed step stay unresolved and are flagged by the resolver.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Input supplied by whatever started the run.
    pub trigger_data: Value,

    /// Per-step records, insertion-ordered by completion.
    steps: IndexMap<String, StepRecord>,

    /// Blueprint config, fixed for the run.
    pub config: HashMap<String, Value>,

    /// Present only while inside a loop iteration.
    loop_scope: Option<LoopScope>,

    /// Run-start date (`YYYY-MM-DD`), exposed to templates as `date`.
    pub date: String,
}

impl RunContext {
    /// Create a fresh context for one run.
    pub fn new(trigger_data: Value, config: HashMap<String, Value>) -> Self {
        Self {
            trigger_data,
            steps: IndexMap::new(),
            config,
            loop_scope: None,
            date: Utc::now().format("%Y-%m-%d").to_string(),
        }
    }

    /// Record a completed step under its name.
    pub fn record_step(&mut self, name: impl Into<String>, record: StepRecord) {
        self.steps.insert(name.into(), record);
    }

    /// Get a step's record.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.get(name)
    }

    /// Whether a step has completed in this run.
    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Number of recorded steps.
    pub fn steps_recorded(&self) -> usize {
        self.steps.len()
    }

    /// A copy of this context scoped to one loop element.
    ///
    /// The copy carries `loop.{item, index, total}`; the original context
    /// never sees the scope, so it cannot leak into sibling steps.
    pub fn with_loop_scope(&self, item: Value, index: usize, total: usize) -> Self {
        let mut scoped = self.clone();
        scoped.loop_scope = Some(LoopScope { item, index, total });
        scoped
    }

    /// Render the context as the value tree templates resolve against.
    pub fn to_value(&self) -> Value {
        let mut root = serde_json::Map::new();

        root.insert("trigger_data".to_string(), self.trigger_data.clone());

        let mut steps = serde_json::Map::new();
        for (name, record) in &self.steps {
            steps.insert(name.clone(), record.to_value());
        }
        root.insert("steps".to_string(), Value::Object(steps));

        let config: serde_json::Map<String, Value> = self
            .config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        root.insert("config".to_string(), Value::Object(config));

        if let Some(scope) = &self.loop_scope {
            root.insert("loop".to_string(), scope.to_value());
        }

        root.insert("date".to_string(), Value::String(self.date.clone()));

        Value::Object(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_record_visibility() {
        let mut ctx = RunContext::new(json!({"query": "laptops"}), HashMap::new());
        assert!(!ctx.has_step("fetch"));

        ctx.record_step(
            "fetch",
            StepRecord::new(json!("results"), StepStatus::Completed),
        );
        assert!(ctx.has_step("fetch"));

        let value = ctx.to_value();
        assert_eq!(value["steps"]["fetch"]["output"], json!("results"));
        assert_eq!(value["steps"]["fetch"]["status"], json!("completed"));
    }

    #[test]
    fn test_loop_scope_does_not_leak() {
        let ctx = RunContext::new(json!({}), HashMap::new());
        let scoped = ctx.with_loop_scope(json!("a"), 0, 3);

        assert_eq!(scoped.to_value()["loop"]["total"], json!(3));
        assert!(ctx.to_value().get("loop").is_none());
    }

    #[test]
    fn test_steps_keep_insertion_order() {
        let mut ctx = RunContext::new(json!({}), HashMap::new());
        for name in ["c", "a", "b"] {
            ctx.record_step(name, StepRecord::new(json!(null), StepStatus::Completed));
        }
        let value = ctx.to_value();
        let keys: Vec<&String> = value["steps"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_context_exposes_date_and_config() {
        let mut config = HashMap::new();
        config.insert("threshold".to_string(), json!(5));
        let ctx = RunContext::new(json!({}), config);

        let value = ctx.to_value();
        assert_eq!(value["config"]["threshold"], json!(5));
        assert!(value["date"].as_str().unwrap().len() == 10);
    }
}
