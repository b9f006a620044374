//! Step execution.
//!
//! Dispatches one step to its execution strategy (capability invocation,
//! loop wrapper, human approval) against an explicitly passed run context.
//! Capability failures become `failed` outcomes, never errors: a failed
//! step is data in the run trace. Only orchestration faults (a collapsed
//! approval gate, an unserializable decision) escape to the run controller.

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use blueprint_capability::CapabilityRegistry;

use crate::blueprint::types::{LoopBody, LoopMode, Step, StepKind};
use crate::context::RunContext;
use crate::engine::approval::{ApprovalGate, ApprovalRequest};
use crate::engine::state::StepStatus;
use crate::error::EngineResult;
use crate::template::resolver::{ResolutionWarning, Resolver};

/// Identity of the run a step executes under, passed to the approval gate.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub execution_id: Uuid,
    pub blueprint_id: String,
}

/// Retry policy applied at the capability seam.
///
/// Timed-out and failed invocations are retried with exponential backoff;
/// unknown capability names are not.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries: every failure is recorded on first occurrence.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((delay as u64).min(self.max_delay_ms))
    }
}

/// Result of executing one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub output: Value,
    pub status: StepStatus,
    pub error: Option<String>,
    pub warnings: Vec<ResolutionWarning>,
}

impl StepOutcome {
    fn completed(output: Value, warnings: Vec<ResolutionWarning>) -> Self {
        Self {
            output,
            status: StepStatus::Completed,
            error: None,
            warnings,
        }
    }

    fn failed(error: String, warnings: Vec<ResolutionWarning>) -> Self {
        Self {
            output: Value::Null,
            status: StepStatus::Failed,
            error: Some(error),
            warnings,
        }
    }
}

/// Executes steps against a capability registry and an approval gate.
pub struct StepExecutor {
    capabilities: Arc<CapabilityRegistry>,
    approval: Arc<dyn ApprovalGate>,
    resolver: Resolver,
    retry: RetryPolicy,
}

impl StepExecutor {
    pub fn new(capabilities: Arc<CapabilityRegistry>, approval: Arc<dyn ApprovalGate>) -> Self {
        Self {
            capabilities,
            approval,
            resolver: Resolver::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Execute one step against the given context.
    ///
    /// `Err` is reserved for orchestration faults; per-step capability
    /// failures come back as `Ok` outcomes with `failed` status.
    pub async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        meta: &RunMeta,
    ) -> EngineResult<StepOutcome> {
        tracing::debug!(step = %step.name, agent = %step.agent, "Executing step");

        match step.kind() {
            StepKind::Invoke => self.execute_body(step, LoopBody::Invoke, ctx, meta).await,
            StepKind::HumanApproval => {
                self.execute_body(step, LoopBody::HumanApproval, ctx, meta)
                    .await
            }
            StepKind::Loop { body } => self.execute_loop(step, body, ctx, meta).await,
        }
    }

    /// Resolve the step input and run the step body once.
    ///
    /// This is the single dispatch path: non-loop steps call it directly,
    /// loop steps call it once per element with a loop-scoped context.
    async fn execute_body(
        &self,
        step: &Step,
        body: LoopBody,
        ctx: &RunContext,
        meta: &RunMeta,
    ) -> EngineResult<StepOutcome> {
        let resolved = self.resolver.resolve(&ctx.to_value(), &step.input);
        for warning in &resolved.warnings {
            tracing::warn!(step = %step.name, %warning, "Template resolution warning");
        }

        match body {
            LoopBody::Invoke => Ok(self
                .invoke_capability(step, resolved.value, resolved.warnings)
                .await),
            LoopBody::HumanApproval => {
                self.request_approval(step, resolved.value, resolved.warnings, meta)
                    .await
            }
        }
    }

    /// Invoke the step's capability with retries and the step's timeout.
    async fn invoke_capability(
        &self,
        step: &Step,
        input: Value,
        warnings: Vec<ResolutionWarning>,
    ) -> StepOutcome {
        let timeout = step.timeout.map(Duration::from_secs);
        let mut attempt: u32 = 0;

        loop {
            match self
                .capabilities
                .invoke_with_timeout(&step.agent, input.clone(), timeout)
                .await
            {
                Ok(output) => {
                    tracing::info!(step = %step.name, agent = %step.agent, "Step completed");
                    return StepOutcome::completed(output, warnings);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        step = %step.name,
                        agent = %step.agent,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Capability invocation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(step = %step.name, agent = %step.agent, error = %e, "Step failed");
                    return StepOutcome::failed(e.to_string(), warnings);
                }
            }
        }
    }

    /// Block on the approval gate and store the decision as output.
    async fn request_approval(
        &self,
        step: &Step,
        input: Value,
        warnings: Vec<ResolutionWarning>,
        meta: &RunMeta,
    ) -> EngineResult<StepOutcome> {
        let decision = self
            .approval
            .decide(ApprovalRequest {
                execution_id: meta.execution_id,
                blueprint_id: meta.blueprint_id.clone(),
                step_name: step.name.clone(),
                input,
            })
            .await?;

        let output = serde_json::to_value(&decision)?;
        Ok(StepOutcome::completed(output, warnings))
    }

    /// Execute a loop step: once per element of the resolved collection.
    async fn execute_loop(
        &self,
        step: &Step,
        body: LoopBody,
        ctx: &RunContext,
        meta: &RunMeta,
    ) -> EngineResult<StepOutcome> {
        let Some(template) = &step.loop_over else {
            return Ok(StepOutcome::completed(Value::Array(vec![]), vec![]));
        };

        let resolved = self.resolver.resolve(&ctx.to_value(), template);
        let mut warnings = resolved.warnings;

        // A non-sequence loop source is a configuration error, not a
        // run-time failure: the step completes with an empty result.
        let items = match resolved.value {
            Value::Array(items) => items,
            other => {
                tracing::warn!(
                    step = %step.name,
                    resolved = %other,
                    "Loop source did not resolve to a sequence, skipping iteration"
                );
                return Ok(StepOutcome::completed(Value::Array(vec![]), warnings));
            }
        };

        let total = items.len();
        tracing::info!(step = %step.name, total, mode = ?step.loop_mode, "Executing loop step");

        let element_outcomes: Vec<EngineResult<StepOutcome>> = match step.loop_mode {
            LoopMode::Sequential => {
                let mut outcomes = Vec::with_capacity(total);
                for (index, item) in items.into_iter().enumerate() {
                    let scoped = ctx.with_loop_scope(item, index, total);
                    outcomes.push(self.execute_body(step, body, &scoped, meta).await);
                }
                outcomes
            }
            LoopMode::Parallel => {
                let futures: Vec<_> = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let scoped = ctx.with_loop_scope(item, index, total);
                        async move { self.execute_body(step, body, &scoped, meta).await }
                    })
                    .collect();
                join_all(futures).await
            }
        };

        let mut outputs = Vec::with_capacity(total);
        let mut failed = 0;
        for outcome in element_outcomes {
            let outcome = outcome?;
            warnings.extend(outcome.warnings);
            match outcome.status {
                StepStatus::Completed => outputs.push(outcome.output),
                StepStatus::Failed => {
                    failed += 1;
                    outputs.push(serde_json::json!({
                        "error": outcome.error,
                        "status": "failed",
                    }));
                }
            }
        }

        if total > 0 && failed == total {
            return Ok(StepOutcome {
                output: Value::Array(outputs),
                status: StepStatus::Failed,
                error: Some(format!("all {} loop iterations failed", total)),
                warnings,
            });
        }

        Ok(StepOutcome::completed(Value::Array(outputs), warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blueprint_capability::{Capability, CapabilityError, StubCapability};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::blueprint::types::HUMAN_APPROVAL_AGENT;
    use crate::engine::approval::AutoApprovalGate;

    /// Capability that records every input it receives.
    struct RecordingCapability {
        inputs: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Capability for RecordingCapability {
        fn name(&self) -> &str {
            "record"
        }

        async fn invoke(&self, input: Value) -> Result<Value, CapabilityError> {
            self.inputs.lock().unwrap().push(input.clone());
            Ok(json!({"echo": input}))
        }
    }

    /// Capability that fails a fixed number of times before succeeding.
    struct FlakyCapability {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl Capability for FlakyCapability {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn invoke(&self, _input: Value) -> Result<Value, CapabilityError> {
            if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(CapabilityError::Invocation {
                    capability: "flaky".to_string(),
                    message: "transient".to_string(),
                })
            } else {
                Ok(json!("recovered"))
            }
        }
    }

    fn make_step(name: &str, agent: &str, input: Value) -> Step {
        Step {
            name: name.to_string(),
            agent: agent.to_string(),
            input,
            output: format!("{}_result", name),
            loop_over: None,
            loop_mode: LoopMode::Sequential,
            condition: None,
            timeout: None,
        }
    }

    fn make_meta() -> RunMeta {
        RunMeta {
            execution_id: Uuid::new_v4(),
            blueprint_id: "bp1".to_string(),
        }
    }

    fn executor_with(registry: CapabilityRegistry) -> StepExecutor {
        StepExecutor::new(Arc::new(registry), Arc::new(AutoApprovalGate))
            .with_retry_policy(RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_invoke_receives_resolved_input() {
        let inputs = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CapabilityRegistry::new();
        registry.register(RecordingCapability {
            inputs: inputs.clone(),
        });

        let executor = executor_with(registry);
        let ctx = RunContext::new(json!({"query": "laptops"}), HashMap::new());
        let step = make_step("fetch", "record", json!("{{ trigger_data.query }}"));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_completed());
        assert_eq!(inputs.lock().unwrap().as_slice(), &[json!("laptops")]);
    }

    #[tokio::test]
    async fn test_unknown_capability_fails_step() {
        let executor = executor_with(CapabilityRegistry::new());
        let ctx = RunContext::new(json!({}), HashMap::new());
        let step = make_step("fetch", "missing_agent", json!({}));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_failed());
        assert!(outcome.error.unwrap().contains("missing_agent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_recorded_as_failure() {
        let mut registry = CapabilityRegistry::new();
        registry.register(
            StubCapability::new("slow_agent", json!("late")).with_delay(Duration::from_secs(10)),
        );

        let executor = executor_with(registry);
        let ctx = RunContext::new(json!({}), HashMap::new());
        let mut step = make_step("fetch", "slow_agent", json!({}));
        step.timeout = Some(1);

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_failed());
        assert!(outcome.error.unwrap().contains("slow_agent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_transient_failure() {
        let mut registry = CapabilityRegistry::new();
        registry.register(FlakyCapability {
            failures_left: AtomicU32::new(2),
        });

        let executor = StepExecutor::new(Arc::new(registry), Arc::new(AutoApprovalGate));
        let ctx = RunContext::new(json!({}), HashMap::new());
        let step = make_step("fetch", "flaky", json!({}));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_completed());
        assert_eq!(outcome.output, json!("recovered"));
    }

    #[tokio::test]
    async fn test_loop_iterates_in_order() {
        let inputs = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CapabilityRegistry::new();
        registry.register(RecordingCapability {
            inputs: inputs.clone(),
        });

        let executor = executor_with(registry);
        let ctx = RunContext::new(json!({"items": [1, 2, 3]}), HashMap::new());
        let mut step = make_step(
            "fanout",
            "record",
            json!({"value": "{{ loop.item }}", "position": "{{ loop.index }}/{{ loop.total }}"}),
        );
        step.loop_over = Some(json!("{{ trigger_data.items }}"));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_completed());
        assert_eq!(outcome.output.as_array().unwrap().len(), 3);

        let seen = inputs.lock().unwrap();
        assert_eq!(seen[0]["position"], json!("0/3"));
        assert_eq!(seen[1]["position"], json!("1/3"));
        assert_eq!(seen[2]["position"], json!("2/3"));
        assert_eq!(seen[0]["value"], json!(1));
    }

    #[tokio::test]
    async fn test_parallel_loop_preserves_order() {
        struct SkewedEcho;

        #[async_trait]
        impl Capability for SkewedEcho {
            fn name(&self) -> &str {
                "echo"
            }

            async fn invoke(&self, input: Value) -> Result<Value, CapabilityError> {
                // Later elements finish first.
                let index = input["index"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(30 - 10 * index.min(2))).await;
                Ok(input["index"].clone())
            }
        }

        let mut registry = CapabilityRegistry::new();
        registry.register(SkewedEcho);

        let executor = executor_with(registry);
        let ctx = RunContext::new(json!({"items": ["a", "b", "c"]}), HashMap::new());
        let mut step = make_step("fanout", "echo", json!({"index": "{{ loop.index }}"}));
        step.loop_over = Some(json!("{{ trigger_data.items }}"));
        step.loop_mode = LoopMode::Parallel;

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert_eq!(outcome.output, json!([0, 1, 2]));
    }

    #[tokio::test]
    async fn test_loop_non_sequence_source_is_empty_completed() {
        let executor = executor_with(CapabilityRegistry::new());
        let ctx = RunContext::new(json!({"items": "not a list"}), HashMap::new());
        let mut step = make_step("fanout", "record", json!({}));
        step.loop_over = Some(json!("{{ trigger_data.items }}"));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_completed());
        assert_eq!(outcome.output, json!([]));
    }

    #[tokio::test]
    async fn test_loop_element_failure_does_not_stop_iteration() {
        struct PickyCapability;

        #[async_trait]
        impl Capability for PickyCapability {
            fn name(&self) -> &str {
                "picky"
            }

            async fn invoke(&self, input: Value) -> Result<Value, CapabilityError> {
                if input == json!(2) {
                    Err(CapabilityError::Invocation {
                        capability: "picky".to_string(),
                        message: "rejected element".to_string(),
                    })
                } else {
                    Ok(input)
                }
            }
        }

        let mut registry = CapabilityRegistry::new();
        registry.register(PickyCapability);

        let executor = executor_with(registry);
        let ctx = RunContext::new(json!({"items": [1, 2, 3]}), HashMap::new());
        let mut step = make_step("fanout", "picky", json!("{{ loop.item }}"));
        step.loop_over = Some(json!("{{ trigger_data.items }}"));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_completed());

        let results = outcome.output.as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], json!(1));
        assert_eq!(results[1]["status"], json!("failed"));
        assert_eq!(results[2], json!(3));
    }

    #[tokio::test]
    async fn test_loop_all_elements_failed_marks_step_failed() {
        let mut registry = CapabilityRegistry::new();
        registry.register(StubCapability::failing("doomed", "always down"));

        let executor = executor_with(registry);
        let ctx = RunContext::new(json!({"items": [1, 2]}), HashMap::new());
        let mut step = make_step("fanout", "doomed", json!({}));
        step.loop_over = Some(json!("{{ trigger_data.items }}"));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_failed());
        assert_eq!(outcome.output.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_human_approval_produces_decision() {
        let executor = executor_with(CapabilityRegistry::new());
        let ctx = RunContext::new(json!({}), HashMap::new());
        let step = make_step("review", HUMAN_APPROVAL_AGENT, json!(["draft"]));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_completed());
        assert_eq!(outcome.output["approved"], json!(true));
        assert_eq!(outcome.output["approved_items"], json!(["draft"]));
    }

    #[tokio::test]
    async fn test_unresolved_input_collects_warning() {
        let mut registry = CapabilityRegistry::new();
        registry.register(StubCapability::new("agentx", json!("ok")));

        let executor = executor_with(registry);
        let ctx = RunContext::new(json!({}), HashMap::new());
        let step = make_step("fetch", "agentx", json!("{{ steps.missing.output }}"));

        let outcome = executor.execute(&step, &ctx, &make_meta()).await.unwrap();
        assert!(outcome.status.is_completed());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].path, "steps.missing.output");
    }
}
