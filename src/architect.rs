//! The Architect: a single-shot, planning-only controller invoked once per
//! run (§4.4).

use std::sync::Arc;

use futures::StreamExt;

use crate::error::EngineError;
use crate::session::provider::{AgentProvider, ContentPart, ProviderMessageKind, SystemSubtype};

const ARCHITECT_ROLE_PROMPT: &str = "You are the Architect. You may not edit any files. Produce \
a short, numbered implementation plan for the task below. When the plan is ready, call \
exit_plan_mode with the plan text, or end your message with a line reading exactly: PLAN COMPLETE";

const SENTINEL: &str = "PLAN COMPLETE";

/// Wraps a provider session opened in plan-only permission mode (the
/// embedder configures its guard to deny every reviewable tool
/// unconditionally for this session, e.g. via
/// [`crate::permission::PermissionBroker::deny_all`]).
pub struct Architect {
    provider: Arc<dyn AgentProvider>,
}

impl Architect {
    pub fn new(provider: Arc<dyn AgentProvider>) -> Self {
        Self { provider }
    }

    pub async fn create_plan(&self, task: &str) -> Result<String, EngineError> {
        self.provider
            .send_prompt(&format!("{ARCHITECT_ROLE_PROMPT}\n\nTask: {task}"))
            .await?;

        let mut stream = self.provider.messages();
        let mut saw_turn_limit = false;

        loop {
            let message = match stream.next().await {
                Some(m) => m,
                None => break,
            };

            if let ProviderMessageKind::System {
                subtype: SystemSubtype::TurnLimitReached,
            } = message.kind
            {
                saw_turn_limit = true;
            }

            for part in message.content {
                match part {
                    ContentPart::ToolUse { name, input, .. } if name == "exit_plan_mode" => {
                        if let Some(plan) = input.get("plan").and_then(|v| v.as_str()) {
                            return Ok(plan.to_string());
                        }
                    }
                    ContentPart::Text(text) => {
                        if let Some(plan) = extract_sentinel_plan(&text) {
                            return Ok(plan);
                        }
                    }
                    _ => {}
                }
            }
        }

        if saw_turn_limit {
            Err(EngineError::ArchitectFailure("turn limit".to_string()))
        } else {
            Err(EngineError::ArchitectFailure("no plan created".to_string()))
        }
    }
}

fn extract_sentinel_plan(text: &str) -> Option<String> {
    let idx = text.find(SENTINEL)?;
    let plan = text[..idx].trim();
    if plan.is_empty() {
        None
    } else {
        Some(plan.to_string())
    }
}
