//! The implementation loop's high-level phase and its transition graph.
//!
//! ```text
//!   INIT -> PLANNING -> (plan) -> EXECUTING <-> REVIEWING
//!                        |                         |
//!                     FAILED                    COMPLETE
//! ```
//!
//! `Phase` models the steady-state phases (`planning`, `execution`,
//! `review`, `complete`); `INIT`/`FAILED` are run-level outcomes handled by
//! [`crate::engine::RunOutcome`] rather than a phase the session reports.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Execution,
    Review,
    Complete,
}

impl Phase {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// `complete` is terminal; the only backwards edge in the graph is
    /// `review -> execution` on a failed review (§4.6 REVIEWING).
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Planning, Execution) => true,
            (Execution, Review) => true,
            (Execution, Complete) => true,
            (Review, Execution) => true,
            (Review, Complete) => true,
            (same, next) if same == next => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Planning => write!(f, "planning"),
            Phase::Execution => write!(f, "execution"),
            Phase::Review => write!(f, "review"),
            Phase::Complete => write!(f, "complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_legal() {
        assert!(Phase::Planning.can_transition_to(Phase::Execution));
        assert!(Phase::Execution.can_transition_to(Phase::Review));
        assert!(Phase::Review.can_transition_to(Phase::Complete));
    }

    #[test]
    fn review_can_fall_back_to_execution() {
        assert!(Phase::Review.can_transition_to(Phase::Execution));
    }

    #[test]
    fn complete_is_terminal() {
        assert!(Phase::Complete.is_terminal());
        assert!(!Phase::Complete.can_transition_to(Phase::Execution));
        assert!(!Phase::Complete.can_transition_to(Phase::Review));
    }

    #[test]
    fn planning_cannot_skip_to_review() {
        assert!(!Phase::Planning.can_transition_to(Phase::Review));
        assert!(!Phase::Planning.can_transition_to(Phase::Complete));
    }
}
