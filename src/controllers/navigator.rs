//! The Navigator controller: reviews Driver tool use and final work,
//! enforcing the "commit barrier" so a command batch is only released once
//! every `tool_use` in it has a matching `tool_result` (§4.5, §5, §8 P3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, Notify};

use crate::controllers::commands::NavigatorCommand;
use crate::error::EngineError;
use crate::permission::{PermissionOutcome, PermissionRequest};
use crate::session::provider::{AgentProvider, ContentPart, ProviderMessageKind};

const NAVIGATOR_ROLE_PROMPT: &str = "You are the Navigator. Review the Driver's file mutations \
and, on request, the completed implementation. Resolve each permission request with exactly one \
approve or deny call, and issue a code_review when the Driver requests one.";

const PERMISSION_PROMPT_PREFIX: &str =
    "A permission request needs your decision. Respond with exactly one approve or deny call.";

const STRICT_REVIEW_PROMPT: &str =
    "Reply with exactly one code_review tool call and nothing else.";

#[derive(Debug, Default)]
struct NavigatorInner {
    ready: Vec<NavigatorCommand>,
    pending: HashMap<String, NavigatorCommand>,
    turn_text: Vec<String>,
    stream_ended: bool,
    turns: usize,
}

pub struct NavigatorController {
    provider: Arc<dyn AgentProvider>,
    inner: Arc<Mutex<NavigatorInner>>,
    activity: Arc<Notify>,
    quiesce_window: Duration,
}

impl NavigatorController {
    pub fn new(provider: Arc<dyn AgentProvider>) -> Self {
        let controller = Self {
            provider,
            inner: Arc::new(Mutex::new(NavigatorInner::default())),
            activity: Arc::new(Notify::new()),
            quiesce_window: Duration::from_millis(300),
        };
        controller.spawn_consumer();
        controller
    }

    pub async fn initialize(&self, task: &str, plan: &str) -> Result<(), EngineError> {
        self.inner.lock().await.turns += 1;
        self.provider
            .send_prompt(&format!(
                "{NAVIGATOR_ROLE_PROMPT}\n\nTask: {task}\n\nPlan:\n{plan}"
            ))
            .await
    }

    /// Send Driver-originated text and return the batch of commands the
    /// Navigator committed to in response.
    pub async fn process_driver_message(
        &self,
        text: &str,
        is_review: bool,
    ) -> Result<Vec<NavigatorCommand>, EngineError> {
        let framed = if is_review {
            format!("[REVIEW REQUEST]\n{text}")
        } else {
            format!("[DRIVER UPDATE]\n{text}")
        };
        self.inner.lock().await.turns += 1;
        self.provider.send_prompt(&framed).await?;
        self.drain_until_quiescent().await;
        let mut inner = self.inner.lock().await;
        Ok(std::mem::take(&mut inner.ready))
    }

    /// Re-prompt with a strict instruction during the Navigator
    /// empty-batch-retry loop (§4.6).
    pub async fn request_strict_review(&self) -> Result<Vec<NavigatorCommand>, EngineError> {
        self.inner.lock().await.turns += 1;
        self.provider.send_prompt(STRICT_REVIEW_PROMPT).await?;
        self.drain_until_quiescent().await;
        let mut inner = self.inner.lock().await;
        Ok(std::mem::take(&mut inner.ready))
    }

    /// A focused variant: injects a single permission prompt and expects
    /// exactly one approve/deny command; any code_review in that batch is
    /// ignored.
    pub async fn review_permission(
        &self,
        request: &PermissionRequest,
    ) -> Result<Option<PermissionOutcome>, EngineError> {
        let prompt = format!(
            "{PERMISSION_PROMPT_PREFIX}\n\nrequestId: {}\ntool: {}\ninput: {}\n\nDriver transcript:\n{}",
            request.request_id, request.tool_name, request.input, request.driver_transcript
        );
        self.inner.lock().await.turns += 1;
        self.provider.send_prompt(&prompt).await?;
        self.drain_until_quiescent().await;
        let mut inner = self.inner.lock().await;
        let batch = std::mem::take(&mut inner.ready);
        drop(inner);

        for command in batch {
            match command {
                NavigatorCommand::Approve { comment, .. } => {
                    return Ok(Some(PermissionOutcome {
                        approved: true,
                        comment,
                    }))
                }
                NavigatorCommand::Deny { comment, .. } => {
                    return Ok(Some(PermissionOutcome {
                        approved: false,
                        comment: Some(comment),
                    }))
                }
                _ => continue,
            }
        }
        Ok(None)
    }

    pub async fn has_ended(&self) -> bool {
        self.inner.lock().await.stream_ended
    }

    /// Turns sent to the Navigator so far this run (`NAVIGATOR_MAX_TURNS`,
    /// §6).
    pub async fn turn_count(&self) -> usize {
        self.inner.lock().await.turns
    }

    /// Returns and clears assistant text observed since the last call —
    /// used by the loop to feed `SessionState`'s observability ring (§3.1).
    pub async fn take_recent_text(&self) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        std::mem::take(&mut inner.turn_text)
    }

    pub async fn stop(&self) -> Result<(), EngineError> {
        self.provider.interrupt().await?;
        self.provider.end().await
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

    fn spawn_consumer(&self) {
        let provider = self.provider.clone();
        let inner = self.inner.clone();
        let activity = self.activity.clone();

        tokio::spawn(async move {
            let mut stream = provider.messages();
            while let Some(message) = stream.next().await {
                match message.kind {
                    ProviderMessageKind::Assistant => {
                        for part in message.content {
                            match part {
                                ContentPart::ToolUse { id, name, input } => {
                                    if let Some(command) = NavigatorCommand::from_tool_use(&name, &input)
                                    {
                                        inner.lock().await.pending.insert(id, command);
                                    }
                                }
                                ContentPart::ToolResult { tool_use_id, .. } => {
                                    let mut guard = inner.lock().await;
                                    if let Some(command) = guard.pending.remove(&tool_use_id) {
                                        guard.ready.push(command);
                                    }
                                }
                                ContentPart::Text(text) => {
                                    inner.lock().await.turn_text.push(text);
                                }
                            }
                        }
                    }
                    _ => {}
                }
                activity.notify_waiters();
            }
            inner.lock().await.stream_ended = true;
            activity.notify_waiters();
        });
    }
}
