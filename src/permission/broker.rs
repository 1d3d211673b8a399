//! `PermissionBroker` — the gate every reviewable Driver tool call passes
//! through (§4.3).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::controllers::driver::DriverBuffer;
use crate::ids::{RequestId, ToolId};
use crate::permission::request::{PermissionDecision, PermissionOutcome, PermissionRequest};
use crate::role::Role;
use crate::session::provider::{GuardDecision, GuardOptions, PermissionGuard};
use crate::tool::{is_reviewable, ToolTracker};

struct PendingEntry {
    sender: oneshot::Sender<PermissionOutcome>,
}

/// Forwards gated tool attempts to whatever is consuming
/// [`PermissionRequest`]s (the loop, which turns them into a Navigator
/// prompt) and resolves the matching decision back to the caller.
pub struct PermissionBroker {
    pending: DashMap<RequestId, PendingEntry>,
    driver_buffer: Arc<Mutex<DriverBuffer>>,
    outbound: tokio::sync::mpsc::UnboundedSender<PermissionRequest>,
    timeout: Duration,
    cancellation: CancellationToken,
    tracker: Arc<ToolTracker>,
}

impl PermissionBroker {
    pub fn new(
        driver_buffer: Arc<Mutex<DriverBuffer>>,
        outbound: tokio::sync::mpsc::UnboundedSender<PermissionRequest>,
        timeout: Duration,
        cancellation: CancellationToken,
        tracker: Arc<ToolTracker>,
    ) -> Self {
        Self {
            pending: DashMap::new(),
            driver_buffer,
            outbound,
            timeout,
            cancellation,
            tracker,
        }
    }

    /// A broker stub used by the Architect's plan-mode session: denies every
    /// reviewable tool unconditionally, never contacts a Navigator.
    pub fn deny_all() -> Self {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        Self::new(
            Arc::new(Mutex::new(DriverBuffer::default())),
            tx,
            Duration::from_millis(0),
            CancellationToken::new(),
            Arc::new(ToolTracker::new()),
        )
    }

    pub async fn can_use_tool(
        &self,
        tool_name: &str,
        input: Value,
        tool_id: Option<ToolId>,
    ) -> PermissionDecision {
        if !is_reviewable(tool_name) {
            return PermissionDecision::allow(input);
        }

        // The Driver controller normally already registered this call when
        // it observed the tool-use (`DriverController::spawn_consumer`);
        // fall back to registering it here so every gated call is tracked
        // even if that race is lost (§4.2).
        let tool_id = tool_id.unwrap_or_else(|| {
            self.tracker
                .register(tool_name, input.clone(), Role::Driver)
        });

        let request_id = RequestId::new();
        self.tracker
            .associate_permission_request(&tool_id, request_id.clone());

        let driver_transcript = self.driver_buffer.lock().await.flush();
        let request = PermissionRequest {
            request_id: request_id.clone(),
            driver_transcript,
            tool_name: tool_name.to_string(),
            input: input.clone(),
            tool_id: Some(tool_id),
        };

        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), PendingEntry { sender: tx });

        if self.outbound.send(request).is_err() {
            self.pending.remove(&request_id);
            return PermissionDecision::deny("no Navigator is listening for permission requests");
        }

        tokio::select! {
            result = rx => match result {
                Ok(outcome) => Self::decision_from_outcome(outcome, input),
                Err(_) => {
                    self.pending.remove(&request_id);
                    PermissionDecision::deny("Navigator response channel closed unexpectedly")
                }
            },
            _ = tokio::time::sleep(self.timeout) => {
                self.pending.remove(&request_id);
                PermissionDecision::deny(format!(
                    "Navigator did not respond within {}ms",
                    self.timeout.as_millis()
                ))
            }
            _ = self.cancellation.cancelled() => {
                self.pending.remove(&request_id);
                PermissionDecision::deny("cancelled")
            }
        }
    }

    fn decision_from_outcome(outcome: PermissionOutcome, original_input: Value) -> PermissionDecision {
        if outcome.approved {
            PermissionDecision::allow(original_input)
        } else {
            PermissionDecision::deny(
                outcome
                    .comment
                    .unwrap_or_else(|| "denied by Navigator".to_string()),
            )
        }
    }

    /// Resolve a pending request with a Navigator's approve/deny command.
    /// An unknown `request_id` is an orphan: logged, not re-delivered (§4.3,
    /// B2).
    pub fn resolve(&self, request_id: &RequestId, approved: bool, comment: Option<String>) {
        match self.pending.remove(request_id) {
            Some((_, entry)) => {
                if let Some(tool_id) = self.tracker.tool_id_for_request(request_id) {
                    self.tracker.record_review(&tool_id, approved, comment.clone());
                }
                let _ = entry.sender.send(PermissionOutcome { approved, comment });
            }
            None => {
                warn!(request_id = %request_id, "orphan permission resolution: no pending request");
            }
        }
    }

    /// Fail every outstanding request with `reason`, e.g. on shutdown or
    /// external cancellation.
    pub fn fail_all(&self, reason: &str) {
        let keys: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for request_id in keys {
            if let Some((_, entry)) = self.pending.remove(&request_id) {
                if let Some(tool_id) = self.tracker.tool_id_for_request(&request_id) {
                    self.tracker
                        .record_review(&tool_id, false, Some(reason.to_string()));
                }
                let _ = entry.sender.send(PermissionOutcome {
                    approved: false,
                    comment: Some(reason.to_string()),
                });
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Adapt `can_use_tool` to the shape a provider configuration expects.
    /// `options.tool_id` is the provider's own call id; resolved back to a
    /// tracker-issued [`ToolId`] via the association the Driver controller
    /// made when it first observed the tool-use.
    pub fn as_guard(self: Arc<Self>) -> PermissionGuard {
        Arc::new(move |tool_name: String, input: Value, options: GuardOptions| {
            let broker = self.clone();
            Box::pin(async move {
                let tool_id = options
                    .tool_id
                    .as_deref()
                    .and_then(|call_id| broker.tracker.tool_id_for_call_id(call_id));
                match broker.can_use_tool(&tool_name, input, tool_id).await {
                    PermissionDecision::Allow { updated_input } => GuardDecision::Allow {
                        updated_input,
                        updated_permissions: None,
                    },
                    PermissionDecision::Deny { message } => GuardDecision::Deny { message },
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn broker_with_channel() -> (PermissionBroker, tokio::sync::mpsc::UnboundedReceiver<PermissionRequest>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let broker = PermissionBroker::new(
            Arc::new(Mutex::new(DriverBuffer::default())),
            tx,
            Duration::from_millis(200),
            CancellationToken::new(),
            Arc::new(ToolTracker::new()),
        );
        (broker, rx)
    }

    #[tokio::test]
    async fn non_reviewable_tools_are_allowed_without_contacting_anyone() {
        let (broker, _rx) = broker_with_channel();
        let decision = broker.can_use_tool("Read", json!({"path": "a.rs"}), None).await;
        assert!(matches!(decision, PermissionDecision::Allow { .. }));
    }

    #[tokio::test]
    async fn approval_resolves_with_the_original_input() {
        let (broker, mut rx) = broker_with_channel();
        let broker = Arc::new(broker);
        let b2 = broker.clone();
        let handle = tokio::spawn(async move { b2.can_use_tool("Edit", json!({"x": 1}), None).await });

        let request = rx.recv().await.expect("request forwarded");
        broker.resolve(&request.request_id, true, Some("ok".into()));

        let decision = handle.await.unwrap();
        assert!(matches!(decision, PermissionDecision::Allow { .. }));
    }

    #[tokio::test]
    async fn timeout_produces_a_descriptive_denial() {
        let (broker, _rx) = broker_with_channel();
        let decision = broker.can_use_tool("Edit", json!({}), None).await;
        match decision {
            PermissionDecision::Deny { message } => assert!(message.contains("did not respond")),
            _ => panic!("expected denial"),
        }
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn resolving_an_unknown_request_id_is_a_no_op() {
        let (broker, _rx) = broker_with_channel();
        broker.resolve(&RequestId::new(), true, None);
    }

    #[tokio::test]
    async fn resolution_is_recorded_against_the_tracker_entry() {
        let (broker, mut rx) = broker_with_channel();
        let broker = Arc::new(broker);
        let tracker = broker.tracker.clone();
        let b2 = broker.clone();
        let handle = tokio::spawn(async move { b2.can_use_tool("Edit", json!({}), None).await });

        let request = rx.recv().await.expect("request forwarded");
        let tool_id = request.tool_id.clone().expect("broker self-registers a tool id");
        broker.resolve(&request.request_id, true, Some("ok".into()));
        handle.await.unwrap();

        let call = tracker.get(&tool_id).expect("tracked");
        assert_eq!(call.status, crate::tool::ToolStatus::Approved);
        assert_eq!(call.review_comment.as_deref(), Some("ok"));
    }
}
