//! Blueprint definition types.
//!
//! A blueprint is a named, ordered workflow: each step binds a capability
//! to a templated input, and step order is execution order. Types here are
//! immutable once loaded; re-registering a blueprint replaces it wholesale.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved agent identifier for human-gated approval steps.
///
/// Steps bound to this identifier never reach the capability registry;
/// they resolve through the approval gate instead.
pub const HUMAN_APPROVAL_AGENT: &str = "human_approval";

/// Loop iteration mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// One element at a time, in loop order.
    #[default]
    Sequential,
    /// Elements run concurrently; results are still collected in loop order.
    Parallel,
}

/// What a loop iteration executes per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopBody {
    /// Invoke the step's capability once per element.
    Invoke,
    /// One human approval decision per element.
    HumanApproval,
}

/// Execution strategy for a step, decided at load time.
///
/// The executor dispatches on this closed set; it never inspects raw agent
/// strings at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Invoke the named capability once.
    Invoke,
    /// Execute the body once per element of the resolved loop collection.
    Loop { body: LoopBody },
    /// Human-gated approval.
    HumanApproval,
}

/// One unit of work within a blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within the blueprint. Also the key under which the
    /// step's record is stored in the run context (`steps.<name>`).
    pub name: String,

    /// Capability identifier to invoke, or [`HUMAN_APPROVAL_AGENT`].
    pub agent: String,

    /// Input template (string, mapping, or sequence), resolved against the
    /// run context before invocation.
    pub input: serde_json::Value,

    /// Declared name for the result. Informational; the storage key is
    /// always the step name.
    pub output: String,

    /// Optional template that must resolve to a sequence; when present the
    /// step executes once per element.
    #[serde(default, rename = "loop")]
    pub loop_over: Option<serde_json::Value>,

    /// Iteration mode for loop steps.
    #[serde(default)]
    pub loop_mode: LoopMode,

    /// Optional boolean expression over the step's own result; false halts
    /// the run after this step.
    #[serde(default)]
    pub condition: Option<String>,

    /// Upper bound in seconds for a single capability invocation.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Step {
    /// Whether this step is bound to the reserved approval identifier.
    pub fn is_human_approval(&self) -> bool {
        self.agent == HUMAN_APPROVAL_AGENT
    }

    /// The step's execution strategy.
    pub fn kind(&self) -> StepKind {
        match (self.loop_over.is_some(), self.is_human_approval()) {
            (true, false) => StepKind::Loop {
                body: LoopBody::Invoke,
            },
            (true, true) => StepKind::Loop {
                body: LoopBody::HumanApproval,
            },
            (false, true) => StepKind::HumanApproval,
            (false, false) => StepKind::Invoke,
        }
    }
}

/// Trigger metadata: how the blueprint is invoked.
///
/// Consumed by external schedulers and webhook routers; the engine treats
/// everything beyond `type` as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger type (e.g. `schedule`, `webhook`, `manual`).
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific fields (cron expression, event name, source, ...).
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Trigger {
    /// Webhook event name, if declared.
    pub fn event(&self) -> Option<&str> {
        self.extra.get("event").and_then(|v| v.as_str())
    }

    /// Trigger source name, if declared.
    pub fn source(&self) -> Option<&str> {
        self.extra.get("source").and_then(|v| v.as_str())
    }
}

/// Complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    /// Unique identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Display description.
    pub description: String,

    /// Invocation metadata, opaque to the engine.
    #[serde(default)]
    pub trigger: Option<Trigger>,

    /// Blueprint-level constants, addressable from templates as `config.*`.
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,

    /// Ordered steps; definition order is execution order.
    pub steps: Vec<Step>,
}

impl Blueprint {
    /// Get a step by name.
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// All step names, in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of steps.
    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// The declared trigger type, if any.
    pub fn trigger_type(&self) -> Option<&str> {
        self.trigger.as_ref().map(|t| t.kind.as_str())
    }
}
