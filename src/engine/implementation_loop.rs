//! `ImplementationLoop` — the top-level state machine (§4.6).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::architect::Architect;
use crate::config::EngineConfig;
use crate::controllers::{DriverBuffer, DriverCommand, DriverController, NavigatorCommand, NavigatorController};
use crate::engine::outcome::RunOutcome;
use crate::engine::state::SessionState;
use crate::error::EngineError;
use crate::permission::{PermissionBroker, PermissionRequest};
use crate::phase::Phase;
use crate::session::provider::AgentProvider;
use crate::tool::ToolTracker;

const CONTINUE_PROMPT: &str = "Please continue.";
const GUIDANCE_FOLLOWUP: &str = "Continue with your implementation based on the guidance provided.";
const FALLBACK_REVIEW_COMMENT: &str = "Please address the review comments and continue.";
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const EMPTY_BATCH_BACKOFF: Duration = Duration::from_secs(1);

const COMPLETION_INTENT_NEEDLES: &[&str] = &[
    "implementation is complete",
    "i have completed",
    "finished implementation",
    "ready for review",
    "request a review",
    "should now request a review",
    "please review my work",
];

fn matches_completion_intent(text: &str) -> bool {
    let haystack = text.to_lowercase();
    COMPLETION_INTENT_NEEDLES
        .iter()
        .any(|needle| haystack.contains(needle))
}

/// The provider sessions the embedder opens for each role.
pub struct ProviderBindings {
    pub architect: Arc<dyn AgentProvider>,
    pub driver: Arc<dyn AgentProvider>,
    pub navigator: Arc<dyn AgentProvider>,
}

/// The top-level orchestrator. Owns all long-lived state; controllers and
/// the broker are constructed by it and never escape to a shared-mutable
/// structure (§3 Ownership, §9 "cyclic references").
pub struct ImplementationLoop {
    config: EngineConfig,
    cancellation: CancellationToken,
    state: SessionState,
    tracker: Arc<ToolTracker>,
    broker: Arc<PermissionBroker>,
    permission_rx: mpsc::UnboundedReceiver<PermissionRequest>,
    architect: Architect,
    driver: DriverController,
    navigator: NavigatorController,
    exit_hook: Option<Box<dyn FnOnce(RunOutcome) + Send>>,
}

impl ImplementationLoop {
    pub fn new(
        task: impl Into<String>,
        project_path: &Path,
        bindings: ProviderBindings,
        cancellation: CancellationToken,
        config: EngineConfig,
        exit_hook: Option<Box<dyn FnOnce(RunOutcome) + Send>>,
    ) -> Result<Self, EngineError> {
        let task = task.into();
        if task.is_empty() || task.len() > config.max_prompt_length {
            return Err(EngineError::Validation(format!(
                "task must be non-empty and at most {} bytes",
                config.max_prompt_length
            )));
        }
        if std::fs::metadata(project_path).is_err() {
            return Err(EngineError::Validation(format!(
                "project path {} is not accessible",
                project_path.display()
            )));
        }

        let buffer = Arc::new(Mutex::new(DriverBuffer::default()));
        let tracker = Arc::new(ToolTracker::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let broker = Arc::new(PermissionBroker::new(
            buffer.clone(),
            tx,
            config.permission_timeout,
            cancellation.clone(),
            tracker.clone(),
        ));

        Ok(Self {
            architect: Architect::new(bindings.architect),
            driver: DriverController::new(bindings.driver, buffer, tracker.clone()),
            navigator: NavigatorController::new(bindings.navigator),
            tracker,
            broker,
            permission_rx: rx,
            state: SessionState::new(task),
            cancellation,
            config,
            exit_hook,
        })
    }

    pub fn tracker(&self) -> Arc<ToolTracker> {
        self.tracker.clone()
    }

    pub fn broker(&self) -> Arc<PermissionBroker> {
        self.broker.clone()
    }

    pub async fn run(mut self) -> Result<RunOutcome, EngineError> {
        let outcome = self.run_inner().await;

        // COMPLETE and FAILED share the same teardown (§4.6): stop both
        // controllers and release any permission request still
        // outstanding, regardless of which branch produced the outcome.
        let fail_all_reason = match &outcome {
            Ok(RunOutcome::Completed { .. }) => "run complete".to_string(),
            Ok(RunOutcome::Failed { reason }) => reason.clone(),
            Err(err) => err.to_string(),
        };
        self.broker.fail_all(&fail_all_reason);
        self.driver.stop().await.ok();
        self.navigator.stop().await.ok();

        let reported = match &outcome {
            Ok(o) => o.clone(),
            Err(e) => RunOutcome::Failed { reason: e.to_string() },
        };
        if let Some(hook) = self.exit_hook.take() {
            hook(reported);
        }
        outcome
    }

    async fn run_inner(&mut self) -> Result<RunOutcome, EngineError> {
        let plan = match self.architect.create_plan(&self.state.task.clone()).await {
            Ok(plan) => plan,
            Err(err) => return Err(err),
        };
        self.state.plan = Some(plan.clone());
        self.state.transition_to(Phase::Execution)?;
        self.navigator.initialize(&self.state.task.clone(), &plan).await?;
        self.driver.start_implementation(&plan).await?;

        let deadline = tokio::time::sleep(self.config.session_hard_limit);
        tokio::pin!(deadline);

        let mut nudged_this_stall = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    // Teardown (stop both controllers, fail outstanding
                    // requests) happens once in `run()` for every exit path.
                    return Ok(RunOutcome::Failed { reason: "cancelled".to_string() });
                }
                _ = &mut deadline => {
                    self.state.transition_to(Phase::Complete)?;
                    return Ok(RunOutcome::Failed { reason: "time_limit".to_string() });
                }
                maybe_request = self.permission_rx.recv() => {
                    if let Some(request) = maybe_request {
                        self.relay_permission_request(request).await;
                    }
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }

            self.tracker.clear_older_than(Duration::from_secs(300));

            if self.driver.turn_count().await > self.config.driver_max_turns {
                warn!(limit = self.config.driver_max_turns, "driver turn cap exceeded");
                return Ok(RunOutcome::Failed { reason: "driver_max_turns_exceeded".to_string() });
            }
            if self.navigator.turn_count().await > self.config.navigator_max_turns {
                warn!(limit = self.config.navigator_max_turns, "navigator turn cap exceeded");
                return Ok(RunOutcome::Failed { reason: "navigator_max_turns_exceeded".to_string() });
            }

            let commands = self.driver.get_and_clear_driver_commands().await;

            if let Some(context) = commands.iter().find_map(|c| match c {
                DriverCommand::RequestReview { context } => Some(context.clone()),
                _ => None,
            }) {
                self.driver.interrupt().await.ok();
                let transcript = context.unwrap_or_default();
                self.state.transition_to(Phase::Review)?;
                nudged_this_stall = false;

                match self.run_review_cycle(&transcript).await? {
                    Some((true, summary)) => {
                        self.state.transition_to(Phase::Complete)?;
                        return Ok(RunOutcome::Completed { summary });
                    }
                    Some((false, comment)) => {
                        self.state.transition_to(Phase::Execution)?;
                        self.driver.continue_with_feedback(&comment).await.ok();
                    }
                    None => {
                        self.state.transition_to(Phase::Execution)?;
                        self.driver.continue_with_feedback(CONTINUE_PROMPT).await.ok();
                    }
                }
                continue;
            }

            if let Some(context) = commands.iter().find_map(|c| match c {
                DriverCommand::RequestGuidance { context } => Some(context.clone()),
                _ => None,
            }) {
                self.navigator.process_driver_message(&context, false).await?;
                self.driver.continue_with_feedback(GUIDANCE_FOLLOWUP).await?;
                nudged_this_stall = false;
                continue;
            }

            if self.driver.has_ended().await {
                warn!("driver session ended without a review request");
                return Err(EngineError::ProviderTransport(
                    "driver session ended unexpectedly".to_string(),
                ));
            }

            let recent_text = self.driver.take_recent_text().await;
            for line in &recent_text {
                self.state.record_driver_text(line.clone());
            }
            for line in self.navigator.take_recent_text().await {
                self.state.record_navigator_text(line);
            }
            if recent_text.is_empty() {
                if !nudged_this_stall {
                    self.driver.continue_with_feedback(CONTINUE_PROMPT).await.ok();
                    nudged_this_stall = true;
                }
            } else {
                nudged_this_stall = false;
                let joined = recent_text.join("\n");
                if matches_completion_intent(&joined) {
                    info!("completion-intent heuristic fired, nudging driver to request review");
                    self.driver
                        .continue_with_feedback(
                            "If your implementation is ready, call request_review now.",
                        )
                        .await
                        .ok();
                }
            }
        }
    }

    async fn relay_permission_request(&self, request: PermissionRequest) {
        match self.navigator.review_permission(&request).await {
            Ok(Some(outcome)) => {
                self.broker.resolve(&request.request_id, outcome.approved, outcome.comment);
            }
            Ok(None) => {
                warn!(request_id = %request.request_id, "navigator produced no approve/deny");
                self.broker.resolve(
                    &request.request_id,
                    false,
                    Some("Navigator did not emit approve or deny".to_string()),
                );
            }
            Err(err) => {
                warn!(request_id = %request.request_id, error = %err, "navigator transport error while reviewing permission");
                self.broker
                    .resolve(&request.request_id, false, Some(err.to_string()));
            }
        }
    }

    /// Drives REVIEWING to a verdict, applying the empty-batch retry
    /// policy. `Ok(None)` signals exhausted retries, recovered as a
    /// `NavigatorEmptyBatchError` (never propagated, §7 #4).
    async fn run_review_cycle(&mut self, transcript: &str) -> Result<Option<(bool, String)>, EngineError> {
        let mut batch = self.navigator.process_driver_message(transcript, true).await?;

        let mut attempts = 0;
        while batch.is_empty() && attempts < self.config.navigator_empty_batch_retries {
            attempts += 1;
            tokio::time::sleep(EMPTY_BATCH_BACKOFF).await;
            batch = self.navigator.request_strict_review().await?;
        }

        if batch.is_empty() {
            let err = EngineError::NavigatorEmptyBatch { attempts };
            warn!(error = %err, "navigator empty-batch retries exhausted");
            return Ok(None);
        }

        Ok(interpret_review_batch(&batch))
    }
}

fn interpret_review_batch(batch: &[NavigatorCommand]) -> Option<(bool, String)> {
    for command in batch.iter().rev() {
        match command {
            NavigatorCommand::Complete { summary } => return Some((true, summary.clone())),
            NavigatorCommand::CodeReview { pass, comment } => {
                let comment = if comment.is_empty() {
                    FALLBACK_REVIEW_COMMENT.to_string()
                } else {
                    comment.clone()
                };
                return Some((*pass, comment));
            }
            _ => continue,
        }
    }
    None
}
