//! Run controller.
//!
//! Orchestrates one blueprint execution: initializes the run context,
//! consumes steps strictly in definition order, records each outcome into
//! the context, evaluates step conditions, and always hands the caller an
//! execution summary for any initiated run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::blueprint::types::Blueprint;
use crate::context::{RunContext, StepRecord};
use crate::engine::executor::{RunMeta, StepExecutor};
use crate::engine::state::{RunState, StepStatus};
use crate::error::EngineResult;
use crate::registry::BlueprintRegistry;
use crate::template::resolver::Resolver;

/// Per-step entry in the execution summary.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub name: String,
    pub agent: String,
    pub status: StepStatus,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Terminal artifact of one run. Immutable after return.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub execution_id: Uuid,
    pub blueprint_id: String,
    pub blueprint_name: String,
    pub status: RunState,
    pub steps_executed: usize,
    pub total_steps: usize,
    pub steps: Vec<StepSummary>,
    /// Resolution warnings gathered across the run, for diagnostics.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Executes blueprints end to end.
///
/// The runner owns no run state: each run's context lives on that run's
/// call stack, so concurrent runs cannot interfere.
pub struct BlueprintRunner {
    registry: Arc<BlueprintRegistry>,
    executor: StepExecutor,
    resolver: Resolver,
}

impl BlueprintRunner {
    pub fn new(registry: Arc<BlueprintRegistry>, executor: StepExecutor) -> Self {
        Self {
            registry,
            executor,
            resolver: Resolver::new(),
        }
    }

    /// Execute a registered blueprint.
    ///
    /// The only caller-visible error is an unknown blueprint id, raised
    /// before a run is initiated; once a run starts the caller always
    /// receives a summary.
    pub async fn execute_blueprint(
        &self,
        blueprint_id: &str,
        trigger_data: Option<Value>,
    ) -> EngineResult<ExecutionSummary> {
        let blueprint = self.registry.get(blueprint_id)?;
        Ok(self
            .run(&blueprint, trigger_data.unwrap_or(Value::Null))
            .await)
    }

    /// Run a blueprint to a terminal state and summarize it.
    pub async fn run(&self, blueprint: &Blueprint, trigger_data: Value) -> ExecutionSummary {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let meta = RunMeta {
            execution_id,
            blueprint_id: blueprint.id.clone(),
        };

        let mut ctx = RunContext::new(trigger_data, blueprint.config.clone());
        let total_steps = blueprint.total_steps();
        let mut steps: Vec<StepSummary> = Vec::with_capacity(total_steps);
        let mut warnings: Vec<String> = Vec::new();
        let mut error: Option<String> = None;
        let mut status = RunState::Running;

        tracing::info!(
            execution_id = %execution_id,
            blueprint_id = %blueprint.id,
            total_steps,
            "Blueprint run started"
        );

        for step in &blueprint.steps {
            match self.executor.execute(step, &ctx, &meta).await {
                Ok(outcome) => {
                    warnings.extend(outcome.warnings.iter().map(|w| w.to_string()));

                    let record = StepRecord::new(outcome.output.clone(), outcome.status);
                    let timestamp = record.timestamp;
                    ctx.record_step(step.name.clone(), record);

                    steps.push(StepSummary {
                        name: step.name.clone(),
                        agent: step.agent.clone(),
                        status: outcome.status,
                        output: outcome.output.clone(),
                        error: outcome.error,
                        timestamp,
                    });

                    if let Some(condition) = &step.condition {
                        let scope = condition_scope(&ctx, &outcome.output);
                        let (keep_going, condition_warnings) =
                            self.resolver.evaluate_condition(&scope, condition);
                        warnings.extend(condition_warnings.iter().map(|w| w.to_string()));

                        if !keep_going {
                            // Normal, non-error termination: remaining steps
                            // are simply not run.
                            tracing::info!(
                                execution_id = %execution_id,
                                step = %step.name,
                                "Step condition false, stopping run"
                            );
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(
                        execution_id = %execution_id,
                        step = %step.name,
                        error = %e,
                        "Run fault, terminating"
                    );
                    status = RunState::Failed;
                    error = Some(e.to_string());
                    break;
                }
            }
        }

        if status == RunState::Running {
            status = RunState::Completed;
        }

        tracing::info!(
            execution_id = %execution_id,
            blueprint_id = %blueprint.id,
            status = %status,
            steps_executed = steps.len(),
            total_steps,
            "Blueprint run finished"
        );

        ExecutionSummary {
            execution_id,
            blueprint_id: blueprint.id.clone(),
            blueprint_name: blueprint.name.clone(),
            status,
            steps_executed: steps.len(),
            total_steps,
            steps,
            warnings,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// The value tree a step condition evaluates against: the full run context
/// plus the step's own result under `result`.
fn condition_scope(ctx: &RunContext, result: &Value) -> Value {
    let mut scope = ctx.to_value();
    if let Value::Object(map) = &mut scope {
        map.insert("result".to_string(), result.clone());
    }
    scope
}
