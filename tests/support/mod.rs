//! A scripted [`AgentProvider`] used to drive the end-to-end scenarios in
//! `tests/scenarios.rs` without a real LLM backend (§8, §4.1 "MockProvider").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use pairloop::error::EngineError;
use pairloop::session::provider::{
    AgentProvider, ContentPart, GuardDecision, GuardOptions, PermissionGuard, ProviderMessage,
    ProviderMessageKind,
};

/// Installs a `tracing_subscriber` once per test binary so `tracing::warn!`/
/// `info!` calls made by the engine surface on stderr instead of being
/// silently dropped (mirrors `krusty-cli`'s `fmt()` setup, filtered by
/// `RUST_LOG`). Safe to call from every test; only the first call wins.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One item an agent emits within a turn.
pub enum ScriptItem {
    Text(String),
    /// A tool call whose result is already known (no gate involved) —
    /// used for the Navigator/Driver protocol tools.
    Tool { name: String, input: Value },
    /// A tool call that must pass through whatever guard is attached
    /// (e.g. a Driver `Edit`): emitted, then the turn suspends until the
    /// guard resolves before continuing.
    GatedTool { name: String, input: Value },
}

pub type Turn = Vec<ScriptItem>;

/// Scripted `AgentProvider`. One queued [`Turn`] is played per
/// `send_prompt` call, in order.
pub struct ScriptedProvider {
    sender: mpsc::UnboundedSender<ProviderMessage>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ProviderMessage>>>,
    turns: Mutex<VecDeque<Turn>>,
    guard: Mutex<Option<PermissionGuard>>,
    sent_prompts: Mutex<Vec<String>>,
    ended: AtomicBool,
    call_counter: Arc<AtomicU64>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Turn>) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            turns: Mutex::new(turns.into_iter().collect()),
            guard: Mutex::new(None),
            sent_prompts: Mutex::new(Vec::new()),
            ended: AtomicBool::new(false),
            call_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Attach the permission guard once it exists (after the engine
    /// constructs its broker) — a test-only affordance, not part of the
    /// `AgentProvider` contract.
    pub fn set_guard(&self, guard: PermissionGuard) {
        *self.guard.lock().unwrap() = Some(guard);
    }

    pub fn sent_prompts(&self) -> Vec<String> {
        self.sent_prompts.lock().unwrap().clone()
    }

    fn next_call_id(&self) -> String {
        let n = self.call_counter.fetch_add(1, Ordering::Relaxed);
        format!("call_{n}")
    }
}

#[async_trait]
impl AgentProvider for ScriptedProvider {
    async fn send_prompt(&self, text: &str) -> Result<(), EngineError> {
        if self.ended.load(Ordering::Relaxed) {
            return Err(EngineError::ProviderTransport(
                "session ended".to_string(),
            ));
        }
        self.sent_prompts.lock().unwrap().push(text.to_string());

        let turn = self.turns.lock().unwrap().pop_front();
        let Some(turn) = turn else { return Ok(()) };

        let sender = self.sender.clone();
        let guard = self.guard.lock().unwrap().clone();
        let call_counter = self.call_counter.clone();

        // Spawned, not awaited inline: a gated tool in this turn suspends
        // on the broker, which in turn depends on the loop observing this
        // same `send_prompt` call returning. Blocking here would deadlock.
        tokio::spawn(async move {
            for item in turn {
                match item {
                    ScriptItem::Text(text) => {
                        let _ = sender.send(assistant(vec![ContentPart::Text(text)]));
                    }
                    ScriptItem::Tool { name, input } => {
                        let id = next_id(&call_counter);
                        let _ = sender.send(assistant(vec![
                            ContentPart::ToolUse {
                                id: id.clone(),
                                name,
                                input,
                            },
                            ContentPart::ToolResult {
                                tool_use_id: id,
                                content: serde_json::json!({"status": "ok"}),
                                is_error: false,
                            },
                        ]));
                    }
                    ScriptItem::GatedTool { name, input } => {
                        let id = next_id(&call_counter);
                        let _ = sender.send(assistant(vec![ContentPart::ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input: input.clone(),
                        }]));
                        let options = GuardOptions {
                            tool_id: Some(id.clone()),
                            ..GuardOptions::default()
                        };
                        let (content, is_error) = match &guard {
                            Some(guard) => match guard(name, input, options).await {
                                GuardDecision::Allow { .. } => (serde_json::json!({"status": "ok"}), false),
                                GuardDecision::Deny { message } => {
                                    (serde_json::json!({"error": message}), true)
                                }
                            },
                            None => (serde_json::json!({"status": "ok"}), false),
                        };
                        let _ = sender.send(assistant(vec![ContentPart::ToolResult {
                            tool_use_id: id,
                            content,
                            is_error,
                        }]));
                    }
                }
            }
        });
        Ok(())
    }

    fn messages(&self) -> BoxStream<'static, ProviderMessage> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .expect("messages() called more than once on a ScriptedProvider");
        Box::pin(UnboundedReceiverStream::new(receiver))
    }

    async fn interrupt(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn end(&self) -> Result<(), EngineError> {
        self.ended.store(true, Ordering::Relaxed);
        Ok(())
    }
}

fn next_id(counter: &Arc<AtomicU64>) -> String {
    let n = counter.fetch_add(1, Ordering::Relaxed);
    format!("call_{n}")
}

fn assistant(content: Vec<ContentPart>) -> ProviderMessage {
    ProviderMessage {
        kind: ProviderMessageKind::Assistant,
        session_id: None,
        content,
    }
}

pub fn edit(path: &str, old: &str, new: &str) -> ScriptItem {
    ScriptItem::GatedTool {
        name: "Edit".to_string(),
        input: serde_json::json!({"file_path": path, "old_string": old, "new_string": new}),
    }
}

pub fn request_review(context: Option<&str>) -> ScriptItem {
    let mut input = serde_json::Map::new();
    if let Some(c) = context {
        input.insert("context".to_string(), Value::String(c.to_string()));
    }
    ScriptItem::Tool {
        name: "mcp__driver__driverRequestReview".to_string(),
        input: Value::Object(input),
    }
}

pub fn request_guidance(context: &str) -> ScriptItem {
    ScriptItem::Tool {
        name: "mcp__driver__driverRequestGuidance".to_string(),
        input: serde_json::json!({"context": context}),
    }
}

pub fn approve(comment: &str) -> ScriptItem {
    ScriptItem::Tool {
        name: "mcp__navigator__navigatorApprove".to_string(),
        input: serde_json::json!({"comment": comment}),
    }
}

pub fn deny(comment: &str) -> ScriptItem {
    ScriptItem::Tool {
        name: "mcp__navigator__navigatorDeny".to_string(),
        input: serde_json::json!({"comment": comment}),
    }
}

pub fn code_review(pass: bool, comment: &str) -> ScriptItem {
    ScriptItem::Tool {
        name: "mcp__navigator__navigatorCodeReview".to_string(),
        input: serde_json::json!({"pass": pass, "comment": comment}),
    }
}

pub fn complete(summary: &str) -> ScriptItem {
    ScriptItem::Tool {
        name: "mcp__navigator__navigatorComplete".to_string(),
        input: serde_json::json!({"summary": summary}),
    }
}

pub fn exit_plan_mode(plan: &str) -> ScriptItem {
    ScriptItem::Tool {
        name: "exit_plan_mode".to_string(),
        input: serde_json::json!({"plan": plan}),
    }
}

pub fn architect_provider(plan: &str) -> Arc<ScriptedProvider> {
    ScriptedProvider::new(vec![vec![exit_plan_mode(plan)]])
}
