//! The orchestrator's session state (§3). Owned exclusively by the
//! [`crate::engine::implementation_loop::ImplementationLoop`] task — no
//! `Arc<Mutex<SessionState>>` shared into controller tasks (§5).

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::phase::Phase;
use crate::role::Role;
use crate::session::{Message, RingBuffer, Speaker};

/// Ring capacity for `driver_messages`/`navigator_messages` (§3.1): sized
/// for observability/debugging, not replay.
const TRANSCRIPT_RING_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub task: String,
    pub plan: Option<String>,
    pub started_at: DateTime<Utc>,
    pub driver_messages: RingBuffer<Message>,
    pub navigator_messages: RingBuffer<Message>,
}

impl SessionState {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            phase: Phase::Planning,
            task: task.into(),
            plan: None,
            started_at: Utc::now(),
            driver_messages: RingBuffer::with_capacity(TRANSCRIPT_RING_CAPACITY),
            navigator_messages: RingBuffer::with_capacity(TRANSCRIPT_RING_CAPACITY),
        }
    }

    /// Record a line of Driver assistant text for observability (§3.1).
    pub fn record_driver_text(&mut self, text: impl Into<String>) {
        self.driver_messages
            .push(Message::new(Speaker::Assistant, Role::Driver, text));
    }

    /// Record a line of Navigator assistant text for observability (§3.1).
    pub fn record_navigator_text(&mut self, text: impl Into<String>) {
        self.navigator_messages
            .push(Message::new(Speaker::Assistant, Role::Navigator, text));
    }

    /// Move to `next`, rejecting any edge not in the graph (§4.6, §8 P6).
    pub fn transition_to(&mut self, next: Phase) -> Result<(), EngineError> {
        if !self.phase.can_transition_to(next) {
            return Err(EngineError::Validation(format!(
                "illegal phase transition: {} -> {}",
                self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_in_planning_with_no_plan() {
        let state = SessionState::new("add a logout button");
        assert_eq!(state.phase, Phase::Planning);
        assert!(state.plan.is_none());
    }

    #[test]
    fn illegal_transition_is_rejected_and_state_is_unchanged() {
        let mut state = SessionState::new("task");
        let err = state.transition_to(Phase::Review);
        assert!(err.is_err());
        assert_eq!(state.phase, Phase::Planning);
    }
}
