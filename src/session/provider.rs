//! The `AgentProvider` contract (§4.1).
//!
//! This is the sole interface the engine uses to talk to an external
//! LLM-backed coding agent. Concrete providers (the wire protocol, retries,
//! token accounting) are explicitly out of scope — the engine ships this
//! trait and, for tests, a scripted `ScriptedProvider` (`tests/support`).

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::EngineError;

/// A message yielded by a provider's stream.
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    pub kind: ProviderMessageKind,
    /// The backend's own session identifier, recorded on first occurrence.
    pub session_id: Option<String>,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderMessageKind {
    Assistant,
    User,
    System { subtype: SystemSubtype },
    Result,
}

/// The `system` message subtypes the loop distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemSubtype {
    TurnLimitReached,
    ConversationEnded,
    Other,
}

/// A content part inside an assistant/user message.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: bool,
    },
}

/// Static configuration an embedder supplies when opening a session.
/// Opaque to the engine beyond what it needs to pass through.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub system_prompt: String,
    pub allowed_tools: AllowedTools,
    pub disallowed_tools: Vec<String>,
    pub turn_cap: Option<usize>,
    pub working_dir: std::path::PathBuf,
    pub mcp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AllowedTools {
    All,
    Only(Vec<String>),
}

impl Default for AllowedTools {
    fn default() -> Self {
        AllowedTools::All
    }
}

/// Decision returned by a [`PermissionGuard`] — the shape a provider's
/// `canUseTool` callback expects (§6).
#[derive(Debug, Clone)]
pub enum GuardDecision {
    Allow {
        updated_input: Value,
        updated_permissions: Option<Value>,
    },
    Deny {
        message: String,
    },
}

/// Options passed alongside a guarded tool call.
#[derive(Debug, Clone, Default)]
pub struct GuardOptions {
    pub tool_id: Option<String>,
    pub suggestions: Option<Value>,
    pub metadata: Option<Value>,
}

/// The `canUseTool` callback signature (§6). `PermissionBroker::as_guard`
/// adapts `PermissionBroker::can_use_tool` to this shape.
pub type PermissionGuard = std::sync::Arc<
    dyn Fn(String, Value, GuardOptions) -> BoxFuture<'static, GuardDecision> + Send + Sync,
>;

/// An open session with an external coding agent.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Enqueue a user message. Must not block indefinitely; a full/closed
    /// transport is a [`EngineError::ProviderTransport`].
    async fn send_prompt(&self, text: &str) -> Result<(), EngineError>;

    /// The lazy, ordered sequence of messages this session yields.
    fn messages(&self) -> BoxStream<'static, ProviderMessage>;

    /// Best-effort cancellation; the message stream should terminate soon
    /// after this returns.
    async fn interrupt(&self) -> Result<(), EngineError>;

    /// Dispose resources. Subsequent `send_prompt` calls must fail.
    async fn end(&self) -> Result<(), EngineError>;
}
