//! The Driver controller: wraps a long-running provider session and
//! translates its output stream into structured events (§4.5).

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, Notify};

use crate::controllers::commands::DriverCommand;
use crate::error::EngineError;
use crate::role::Role;
use crate::session::provider::{AgentProvider, ContentPart, ProviderMessageKind};
use crate::tool::{is_reviewable, ToolTracker};

const DRIVER_ROLE_PROMPT: &str = "You are the Driver. Implement the plan below, making file \
edits as needed. When your implementation is ready for review, call the request_review tool. \
If you need help, call request_guidance.";

/// The rolling, ordered list of Driver outputs awaiting the next
/// forward-to-Navigator event. Flushed only at a broker gate or a
/// review/guidance forward (§8 P4: no segment is forwarded twice).
#[derive(Debug, Default)]
pub struct DriverBuffer(Vec<String>);

impl DriverBuffer {
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.0.push(text.into());
    }

    pub fn push_tool_summary(&mut self, tool_name: &str, detail: &str) {
        self.0.push(format!("Tool: {} - {}", tool_name, detail));
    }

    /// Atomically empty the buffer and join its contents.
    pub fn flush(&mut self) -> String {
        self.0.drain(..).collect::<Vec<_>>().join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Default)]
struct DriverInner {
    pending_commands: Vec<DriverCommand>,
    turn_text: Vec<String>,
    stream_ended: bool,
    turns: usize,
}

/// Wraps a Driver's provider session. A background task drains
/// `AgentProvider::messages()` and republishes into owned state guarded by
/// a `Mutex`, woken via a `Notify` on every event (mirrors the teacher's
/// heartbeat-forwarding consumer task).
pub struct DriverController {
    provider: Arc<dyn AgentProvider>,
    buffer: Arc<Mutex<DriverBuffer>>,
    tracker: Arc<ToolTracker>,
    inner: Arc<Mutex<DriverInner>>,
    activity: Arc<Notify>,
    quiesce_window: Duration,
}

impl DriverController {
    pub fn new(
        provider: Arc<dyn AgentProvider>,
        buffer: Arc<Mutex<DriverBuffer>>,
        tracker: Arc<ToolTracker>,
    ) -> Self {
        Self {
            provider,
            buffer,
            tracker,
            inner: Arc::new(Mutex::new(DriverInner::default())),
            activity: Arc::new(Notify::new()),
            quiesce_window: Duration::from_millis(300),
        }
    }

    pub fn buffer(&self) -> Arc<Mutex<DriverBuffer>> {
        self.buffer.clone()
    }

    pub async fn start_implementation(&self, plan: &str) -> Result<(), EngineError> {
        self.spawn_consumer();
        self.inner.lock().await.turns += 1;
        self.provider
            .send_prompt(&format!("{DRIVER_ROLE_PROMPT}\n\nPlan:\n{plan}"))
            .await
    }

    /// Send a user message and drain until the stream goes quiet for
    /// `quiesce_window`, returning the assistant text produced this turn.
    pub async fn continue_with_feedback(&self, text: &str) -> Result<Vec<String>, EngineError> {
        self.inner.lock().await.turns += 1;
        self.provider.send_prompt(text).await?;
        self.drain_until_quiescent().await;
        let mut inner = self.inner.lock().await;
        Ok(std::mem::take(&mut inner.turn_text))
    }

    /// Turns sent to the Driver so far this run (`DRIVER_MAX_TURNS`, §6).
    pub async fn turn_count(&self) -> usize {
        self.inner.lock().await.turns
    }

    async fn drain_until_quiescent(&self) {
        loop {
            let notified = self.activity.notified();
            match tokio::time::timeout(self.quiesce_window, notified).await {
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    /// Returns and clears any `DriverCommand`s observed since the last
    /// call.
    pub async fn get_and_clear_driver_commands(&self) -> Vec<DriverCommand> {
        let mut inner = self.inner.lock().await;
        std::mem::take(&mut inner.pending_commands)
    }

    pub async fn has_ended(&self) -> bool {
        self.inner.lock().await.stream_ended
    }

    /// Returns and clears assistant text observed since the last call —
    /// used by the loop's stall/completion-intent checks (§4.6 steps 5-6).
    pub async fn take_recent_text(&self) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        std::mem::take(&mut inner.turn_text)
    }

    /// Suspend the current turn without ending the session — used when a
    /// `request_review` arrives alongside further Driver output so that
    /// output cannot be persisted after the Driver has committed to review
    /// (§4.5 "Driver message idempotence", §8 B1).
    pub async fn interrupt(&self) -> Result<(), EngineError> {
        self.provider.interrupt().await
    }

    /// Tear down the session for good; used only at COMPLETE/FAILED.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.provider.interrupt().await?;
        self.provider.end().await
    }

    fn spawn_consumer(&self) {
        let provider = self.provider.clone();
        let buffer = self.buffer.clone();
        let tracker = self.tracker.clone();
        let inner = self.inner.clone();
        let activity = self.activity.clone();

        tokio::spawn(async move {
            let mut stream = provider.messages();
            while let Some(message) = stream.next().await {
                if !matches!(message.kind, ProviderMessageKind::Assistant) {
                    continue;
                }
                for part in message.content {
                    match part {
                        ContentPart::Text(text) => {
                            buffer.lock().await.push_text(text.clone());
                            inner.lock().await.turn_text.push(text);
                        }
                        ContentPart::ToolUse { id, name, input } => {
                            let summary = tool_call_summary(&input);
                            buffer.lock().await.push_tool_summary(&name, &summary);

                            let tool_id = tracker.register(&name, input.clone(), Role::Driver);
                            tracker.associate_call_id(&tool_id, id.clone());
                            if !is_reviewable(&name) {
                                tracker.mark_displayed(&tool_id);
                            }

                            if let Some(command) = DriverCommand::from_tool_use(&name, &input) {
                                inner.lock().await.pending_commands.push(command);
                            }
                        }
                        ContentPart::ToolResult { .. } => {}
                    }
                }
                activity.notify_waiters();
            }
            inner.lock().await.stream_ended = true;
            activity.notify_waiters();
        });
    }
}

fn tool_call_summary(input: &serde_json::Value) -> String {
    input
        .get("file_path")
        .or_else(|| input.get("command"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("<no detail>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_empties_and_joins_in_order() {
        let mut buffer = DriverBuffer::default();
        buffer.push_text("hello");
        buffer.push_tool_summary("Edit", "header.tsx");
        let flushed = buffer.flush();
        assert_eq!(flushed, "hello\nTool: Edit - header.tsx");
        assert!(buffer.is_empty());
    }

    #[test]
    fn tool_call_summary_prefers_file_path_over_command() {
        let input = serde_json::json!({"file_path": "a.rs", "command": "ls"});
        assert_eq!(tool_call_summary(&input), "a.rs");
    }
}
