//! Wire shapes for the permission gate (§3, §4.3).

use serde_json::Value;

use crate::ids::{RequestId, ToolId};

/// A gated tool attempt forwarded to the Navigator for a decision.
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    pub request_id: RequestId,
    pub driver_transcript: String,
    pub tool_name: String,
    pub input: Value,
    pub tool_id: Option<ToolId>,
}

/// What the Navigator controller reports back once it observes an
/// `approve`/`deny` command matching a `request_id`.
#[derive(Debug, Clone)]
pub struct PermissionOutcome {
    pub approved: bool,
    pub comment: Option<String>,
}

/// The broker's answer to `can_use_tool`, handed back to the provider.
#[derive(Debug, Clone)]
pub enum PermissionDecision {
    Allow { updated_input: Value },
    Deny { message: String },
}

impl PermissionDecision {
    pub fn allow(input: Value) -> Self {
        PermissionDecision::Allow { updated_input: input }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        PermissionDecision::Deny {
            message: message.into(),
        }
    }
}
