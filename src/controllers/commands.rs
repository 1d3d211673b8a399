//! The closed MCP tool vocabulary (§6) and the structured commands they
//! carry.
//!
//! Dynamic tool-name dispatch is replaced with explicit parsers over a
//! closed sum type (REDESIGN FLAGS): unknown names produce `None`, never a
//! panic.

use serde_json::Value;

use crate::ids::RequestId;

/// The four well-known tools a Navigator session may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigatorTool {
    Approve,
    Deny,
    CodeReview,
    Complete,
}

impl NavigatorTool {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mcp__navigator__navigatorApprove" | "pair-navigator_approve" => Some(Self::Approve),
            "mcp__navigator__navigatorDeny" | "pair-navigator_deny" => Some(Self::Deny),
            "mcp__navigator__navigatorCodeReview" | "pair-navigator_codeReview" => {
                Some(Self::CodeReview)
            }
            "mcp__navigator__navigatorComplete" | "pair-navigator_complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// The two well-known tools a Driver session may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverTool {
    RequestReview,
    RequestGuidance,
}

impl DriverTool {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mcp__driver__driverRequestReview" | "pair-driver_requestReview" => {
                Some(Self::RequestReview)
            }
            "mcp__driver__driverRequestGuidance" | "pair-driver_requestGuidance" => {
                Some(Self::RequestGuidance)
            }
            _ => None,
        }
    }
}

/// A structured action emitted by the Navigator, with its arguments decoded.
#[derive(Debug, Clone)]
pub enum NavigatorCommand {
    Approve {
        request_id: Option<RequestId>,
        comment: Option<String>,
    },
    Deny {
        request_id: Option<RequestId>,
        comment: String,
    },
    CodeReview {
        comment: String,
        pass: bool,
    },
    Complete {
        summary: String,
    },
}

impl NavigatorCommand {
    /// Decode a tool use into a command, returning `None` for unrecognized
    /// tool names. Malformed arguments on a recognized tool fall back to
    /// sensible defaults rather than failing the whole turn.
    pub fn from_tool_use(tool_name: &str, args: &Value) -> Option<Self> {
        let tool = NavigatorTool::parse(tool_name)?;
        let request_id = args
            .get("requestId")
            .and_then(Value::as_str)
            .map(RequestId::from_raw);
        let comment = args
            .get("comment")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        Some(match tool {
            NavigatorTool::Approve => NavigatorCommand::Approve { request_id, comment },
            NavigatorTool::Deny => NavigatorCommand::Deny {
                request_id,
                comment: comment.unwrap_or_default(),
            },
            NavigatorTool::CodeReview => NavigatorCommand::CodeReview {
                comment: comment.unwrap_or_default(),
                pass: args.get("pass").and_then(Value::as_bool).unwrap_or(false),
            },
            NavigatorTool::Complete => NavigatorCommand::Complete {
                summary: args
                    .get("summary")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
        })
    }
}

/// A structured action emitted by the Driver, with its arguments decoded.
#[derive(Debug, Clone)]
pub enum DriverCommand {
    RequestReview { context: Option<String> },
    RequestGuidance { context: String },
}

impl DriverCommand {
    pub fn from_tool_use(tool_name: &str, args: &Value) -> Option<Self> {
        let tool = DriverTool::parse(tool_name)?;
        let context = args
            .get("context")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        Some(match tool {
            DriverTool::RequestReview => DriverCommand::RequestReview { context },
            DriverTool::RequestGuidance => DriverCommand::RequestGuidance {
                context: context.unwrap_or_default(),
            },
        })
    }
}
