//! `ToolTracker` — stable identifiers and review correlation for every
//! attempted tool call (§4.2).
//!
//! Stateless with respect to agents; holds only in-memory indexes, owned
//! by the [`crate::engine::ImplementationLoop`] that constructs it (never a
//! process-wide singleton — REDESIGN FLAGS).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Notify;

use crate::ids::{RequestId, ToolId, ToolIdAllocator};
use crate::role::Role;
use crate::tool::call::{ReviewOutcome, ToolCall, ToolStatus};
use crate::tool::reviewable::is_reviewable;

struct TrackedEntry {
    call: ToolCall,
    notify: Arc<Notify>,
}

/// In-memory indexes correlating tool calls with permission requests and
/// review outcomes.
pub struct ToolTracker {
    allocator: ToolIdAllocator,
    entries: DashMap<ToolId, TrackedEntry>,
    by_request: DashMap<RequestId, ToolId>,
    by_call_id: DashMap<String, ToolId>,
}

impl Default for ToolTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolTracker {
    pub fn new() -> Self {
        Self {
            allocator: ToolIdAllocator::new(),
            entries: DashMap::new(),
            by_request: DashMap::new(),
            by_call_id: DashMap::new(),
        }
    }

    /// Allocate a fresh `ToolId` for a newly observed tool attempt. If the
    /// tool is reviewable and attempted by the Driver, it enters the
    /// pending-review population (implicitly: it stays `Pending` until
    /// `record_review` resolves it).
    pub fn register(&self, tool_name: &str, input: Value, role: Role) -> ToolId {
        let tool_id = self.allocator.next();
        let call = ToolCall::new(tool_id.clone(), tool_name, input, role);
        self.entries.insert(
            tool_id.clone(),
            TrackedEntry {
                call,
                notify: Arc::new(Notify::new()),
            },
        );
        tool_id
    }

    pub fn associate_call_id(&self, tool_id: &ToolId, provider_call_id: impl Into<String>) {
        let provider_call_id = provider_call_id.into();
        if let Some(mut entry) = self.entries.get_mut(tool_id) {
            entry.call.provider_call_id = Some(provider_call_id.clone());
        }
        self.by_call_id.insert(provider_call_id, tool_id.clone());
    }

    pub fn associate_permission_request(&self, tool_id: &ToolId, request_id: RequestId) {
        if let Some(mut entry) = self.entries.get_mut(tool_id) {
            entry.call.permission_request_id = Some(request_id.clone());
        }
        self.by_request.insert(request_id, tool_id.clone());
    }

    /// Look a `ToolId` up by the `PermissionRequest` id that was forwarded
    /// for it.
    pub fn tool_id_for_request(&self, request_id: &RequestId) -> Option<ToolId> {
        self.by_request.get(request_id).map(|e| e.clone())
    }

    /// Look a `ToolId` up by the provider's own call id, recorded via
    /// `associate_call_id` when the tool use was first observed.
    pub fn tool_id_for_call_id(&self, provider_call_id: &str) -> Option<ToolId> {
        self.by_call_id.get(provider_call_id).map(|e| e.clone())
    }

    /// Transition a tracked call to a terminal status, waking any blocked
    /// `wait_for_review` callers. Idempotent: calling this again on an
    /// already-terminal entry with the same outcome leaves it terminal and
    /// still wakes waiters (§8 R2).
    pub fn record_review(&self, tool_id: &ToolId, approved: bool, comment: Option<String>) {
        let notify = if let Some(mut entry) = self.entries.get_mut(tool_id) {
            entry.call.status = if approved {
                ToolStatus::Approved
            } else {
                ToolStatus::Denied
            };
            entry.call.review_comment = comment;
            entry.notify.clone()
        } else {
            return;
        };
        notify.notify_waiters();
    }

    /// Mark a call as having been shown to the user without a formal
    /// approve/deny decision (e.g. a non-reviewable tool surfaced for
    /// display only).
    pub fn mark_displayed(&self, tool_id: &ToolId) {
        if let Some(mut entry) = self.entries.get_mut(tool_id) {
            if entry.call.status == ToolStatus::Pending {
                entry.call.status = ToolStatus::Displayed;
            }
        }
    }

    /// Wait for a tracked call to reach a terminal status, or `deadline`
    /// elapses first (§4.2). Resolves immediately if already terminal.
    pub async fn wait_for_review(&self, tool_id: &ToolId, deadline: Duration) -> Option<ReviewOutcome> {
        if let Some(outcome) = self.terminal_outcome(tool_id) {
            return Some(outcome);
        }

        let notify = self.entries.get(tool_id)?.notify.clone();
        let notified = notify.notified();

        if tokio::time::timeout(deadline, notified).await.is_err() {
            return None;
        }

        self.terminal_outcome(tool_id)
    }

    fn terminal_outcome(&self, tool_id: &ToolId) -> Option<ReviewOutcome> {
        let entry = self.entries.get(tool_id)?;
        match entry.call.status {
            ToolStatus::Approved => Some(ReviewOutcome {
                approved: true,
                comment: entry.call.review_comment.clone(),
            }),
            ToolStatus::Denied => Some(ReviewOutcome {
                approved: false,
                comment: entry.call.review_comment.clone(),
            }),
            ToolStatus::Pending | ToolStatus::Displayed => None,
        }
    }

    pub fn get(&self, tool_id: &ToolId) -> Option<ToolCall> {
        self.entries.get(tool_id).map(|e| e.call.clone())
    }

    /// Garbage-collect fully-terminal calls past `age`. Called
    /// opportunistically by the loop, not from a background task, so
    /// nothing needs to be cancelled on shutdown.
    pub fn clear_older_than(&self, age: Duration) {
        let now = Utc::now();
        let stale: Vec<ToolId> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.call.status.is_terminal()
                    && now
                        .signed_duration_since(entry.call.timestamp)
                        .to_std()
                        .map(|d| d > age)
                        .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        for tool_id in stale {
            if let Some((_, entry)) = self.entries.remove(&tool_id) {
                if let Some(request_id) = entry.call.permission_request_id {
                    self.by_request.remove(&request_id);
                }
                if let Some(call_id) = entry.call.provider_call_id {
                    self.by_call_id.remove(&call_id);
                }
            }
        }
    }
}

/// Whether this tool call should be placed in the pending-review
/// population: reviewable and attempted by the Driver.
pub fn requires_driver_review(tool_name: &str, role: Role) -> bool {
    role == Role::Driver && is_reviewable(tool_name)
}
