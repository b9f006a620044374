//! Blueprint Execution Engine
//!
//! Turns a declarative workflow definition (a named sequence of steps,
//! each bound to an executing capability, with data dependencies between
//! steps) into a concrete execution run:
//!
//! - **Definition loading**: YAML blueprints parsed and structurally
//!   validated, with per-file error isolation for directory loads
//! - **Variable resolution**: `{{ dotted.path }}` placeholders resolved
//!   against the run context, failing soft on missing references
//! - **Step execution**: capability invocation, collection iteration, and
//!   human-gated approval, with per-step timeouts and retries
//! - **Run control**: strict definition-order execution, condition-based
//!   early stop, and a deterministic execution summary per run
//! - **Registry**: id-indexed blueprint lookup for schedulers and routers
//!
//! ## Modules
//!
//! - [`blueprint`]: definition types, parser, directory loader
//! - [`template`]: placeholder tokenizer and fail-soft resolver
//! - [`context`]: the run-scoped resolution context
//! - [`engine`]: step executor, approval gate, run controller
//! - [`registry`]: blueprint registry
//! - [`error`]: engine error taxonomy
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use blueprint_capability::create_default_registry;
//! use blueprint_engine::{
//!     blueprint::load_dir, engine::{AutoApprovalGate, BlueprintRunner, StepExecutor},
//!     registry::BlueprintRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(BlueprintRegistry::new());
//!     registry.register_all(load_dir("blueprints/".as_ref())?);
//!
//!     let executor = StepExecutor::new(
//!         Arc::new(create_default_registry()),
//!         Arc::new(AutoApprovalGate),
//!     );
//!     let runner = BlueprintRunner::new(registry, executor);
//!     let summary = runner.execute_blueprint("my_blueprint", None).await?;
//!     println!("{}", summary.status);
//!     Ok(())
//! }
//! ```

pub mod blueprint;
pub mod context;
pub mod engine;
pub mod error;
pub mod registry;
pub mod template;

pub use blueprint::{Blueprint, Step, StepKind, HUMAN_APPROVAL_AGENT};
pub use context::{RunContext, StepRecord};
pub use engine::{
    ApprovalDecision, ApprovalGate, AutoApprovalGate, BlueprintRunner, ExecutionSummary,
    RetryPolicy, RunState, StepExecutor, StepStatus,
};
pub use error::{EngineError, EngineResult};
pub use registry::{BlueprintRegistry, BlueprintSummary};
pub use template::{Resolved, ResolutionWarning, Resolver};
