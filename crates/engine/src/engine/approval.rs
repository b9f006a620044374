//! Human-gated approval.
//!
//! Approval steps never reach the capability registry: the run blocks on
//! an [`ApprovalGate`] until a decision object exists, then stores the
//! decision as the step's output. The notification channel that reaches a
//! human (email, chat, UI) is an external collaborator behind the gate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// A resolved human decision, stored verbatim as the approval step's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_items: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub approved_at: DateTime<Utc>,
}

impl ApprovalDecision {
    /// An approval covering the given items.
    pub fn approve(approved_by: impl Into<String>, approved_items: Option<Value>) -> Self {
        Self {
            approved: true,
            approved_items,
            approved_by: Some(approved_by.into()),
            approved_at: Utc::now(),
        }
    }

    /// A rejection.
    pub fn reject(approved_by: impl Into<String>) -> Self {
        Self {
            approved: false,
            approved_items: None,
            approved_by: Some(approved_by.into()),
            approved_at: Utc::now(),
        }
    }
}

/// What a gate implementation gets to present to the approver.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub execution_id: Uuid,
    pub blueprint_id: String,
    pub step_name: String,
    /// The step's resolved input, typically the material under review.
    pub input: Value,
}

/// The seam between a run and its human approver.
///
/// `decide` blocks the awaiting run until a decision exists; the run state
/// machine stays in `Running` for the duration of the wait.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn decide(&self, request: ApprovalRequest) -> EngineResult<ApprovalDecision>;
}

/// Gate that approves everything immediately.
///
/// For development and tests only; production wiring should hand the
/// engine a gate backed by a real response channel.
pub struct AutoApprovalGate;

#[async_trait]
impl ApprovalGate for AutoApprovalGate {
    async fn decide(&self, request: ApprovalRequest) -> EngineResult<ApprovalDecision> {
        tracing::debug!(
            step = %request.step_name,
            blueprint_id = %request.blueprint_id,
            "Auto-approving human approval step"
        );
        Ok(ApprovalDecision::approve("auto", Some(request.input)))
    }
}

/// A request waiting for an external responder.
#[derive(Debug)]
pub struct PendingApproval {
    pub request_id: Uuid,
    pub request: ApprovalRequest,
}

/// Gate that parks each request until an external responder resolves it.
///
/// `decide` publishes a [`PendingApproval`] on the receiver handed out by
/// [`ChannelApprovalGate::new`] and blocks on a oneshot until
/// [`ChannelApprovalGate::resolve`] is called with the request id.
pub struct ChannelApprovalGate {
    pending: Mutex<HashMap<Uuid, oneshot::Sender<ApprovalDecision>>>,
    requests: mpsc::UnboundedSender<PendingApproval>,
}

impl ChannelApprovalGate {
    /// Create a gate plus the stream of pending requests to service.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingApproval>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                pending: Mutex::new(HashMap::new()),
                requests: tx,
            },
            rx,
        )
    }

    /// Resolve a pending request with a decision.
    pub fn resolve(&self, request_id: Uuid, decision: ApprovalDecision) -> EngineResult<()> {
        let sender = self
            .pending
            .lock()
            .map_err(|_| EngineError::RunFault("approval gate lock poisoned".to_string()))?
            .remove(&request_id)
            .ok_or_else(|| EngineError::NotFound(format!("pending approval {}", request_id)))?;

        sender
            .send(decision)
            .map_err(|_| EngineError::RunFault("approval requester gone".to_string()))
    }
}

#[async_trait]
impl ApprovalGate for ChannelApprovalGate {
    async fn decide(&self, request: ApprovalRequest) -> EngineResult<ApprovalDecision> {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        self.pending
            .lock()
            .map_err(|_| EngineError::RunFault("approval gate lock poisoned".to_string()))?
            .insert(request_id, tx);

        tracing::info!(
            request_id = %request_id,
            step = %request.step_name,
            blueprint_id = %request.blueprint_id,
            "Waiting for human approval"
        );

        self.requests
            .send(PendingApproval {
                request_id,
                request,
            })
            .map_err(|_| EngineError::RunFault("approval request channel closed".to_string()))?;

        rx.await
            .map_err(|_| EngineError::RunFault("approval responder dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_request() -> ApprovalRequest {
        ApprovalRequest {
            execution_id: Uuid::new_v4(),
            blueprint_id: "bp1".to_string(),
            step_name: "review".to_string(),
            input: json!(["draft one", "draft two"]),
        }
    }

    #[tokio::test]
    async fn test_auto_gate_approves_input() {
        let decision = AutoApprovalGate.decide(make_request()).await.unwrap();
        assert!(decision.approved);
        assert_eq!(
            decision.approved_items,
            Some(json!(["draft one", "draft two"]))
        );
        assert_eq!(decision.approved_by.as_deref(), Some("auto"));
    }

    #[tokio::test]
    async fn test_channel_gate_blocks_until_resolved() {
        let (gate, mut requests) = ChannelApprovalGate::new();
        let gate = std::sync::Arc::new(gate);

        let responder = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let pending = requests.recv().await.unwrap();
                assert_eq!(pending.request.step_name, "review");
                gate.resolve(
                    pending.request_id,
                    ApprovalDecision::approve("ops@example.com", None),
                )
                .unwrap();
            })
        };

        let decision = gate.decide(make_request()).await.unwrap();
        assert!(decision.approved);
        assert_eq!(decision.approved_by.as_deref(), Some("ops@example.com"));
        responder.await.unwrap();
    }

    #[test]
    fn test_resolve_unknown_request() {
        let (gate, _requests) = ChannelApprovalGate::new();
        let result = gate.resolve(Uuid::new_v4(), ApprovalDecision::reject("nobody"));
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_decision_serialization_shape() {
        let decision = ApprovalDecision::approve("reviewer", Some(json!([1])));
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["approved"], json!(true));
        assert_eq!(value["approved_items"], json!([1]));
        assert!(value.get("approved_at").is_some());
    }
}
