//! The three agent roles the orchestrator coordinates.

use serde::{Deserialize, Serialize};

/// Which of the three collaborating agent sessions a [`crate::session::Message`]
/// or [`crate::tool::ToolCall`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Architect,
    Driver,
    Navigator,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Architect => write!(f, "architect"),
            Role::Driver => write!(f, "driver"),
            Role::Navigator => write!(f, "navigator"),
        }
    }
}
