//! The tracked `ToolCall` record (§3).

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::ids::{RequestId, ToolId};
use crate::role::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Pending,
    Approved,
    Denied,
    Displayed,
}

impl ToolStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ToolStatus::Pending)
    }
}

/// A tool call the tracker has registered, plus its review lifecycle.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool_id: ToolId,
    pub tool_name: String,
    pub input: Value,
    pub session_role: Role,
    pub timestamp: DateTime<Utc>,
    pub status: ToolStatus,
    pub review_comment: Option<String>,
    pub provider_call_id: Option<String>,
    pub permission_request_id: Option<RequestId>,
}

impl ToolCall {
    pub fn new(tool_id: ToolId, tool_name: impl Into<String>, input: Value, role: Role) -> Self {
        Self {
            tool_id,
            tool_name: tool_name.into(),
            input,
            session_role: role,
            timestamp: Utc::now(),
            status: ToolStatus::Pending,
            review_comment: None,
            provider_call_id: None,
            permission_request_id: None,
        }
    }
}

/// The outcome delivered to a [`crate::tool::ToolTracker::wait_for_review`]
/// caller once a call reaches a terminal status.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub approved: bool,
    pub comment: Option<String>,
}
