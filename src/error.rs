//! Error taxonomy for the pair-programming orchestration engine.
//!
//! Mirrors the recoverable/fatal split the orchestrator relies on: timeouts
//! and malformed Navigator turns are converted to synthetic decisions and
//! never leave the broker; everything else bubbles out of
//! [`crate::engine::ImplementationLoop::run`].

use thiserror::Error;

/// The closed set of failure modes the engine can produce.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("Navigator did not respond within {timeout_ms}ms")]
    PermissionTimeout { timeout_ms: u64 },

    #[error("Navigator returned no approve/deny for permission request: {reason}")]
    PermissionMalformed { reason: String },

    #[error("Navigator produced no command after {attempts} retries")]
    NavigatorEmptyBatch { attempts: usize },

    #[error("architect failed to produce a plan: {0}")]
    ArchitectFailure(String),

    #[error("agent provider transport error: {0}")]
    ProviderTransport(String),

    #[error("run cancelled: {0}")]
    Cancelled(String),
}

impl EngineError {
    /// Whether this error is handled locally (never surfaces as a fatal
    /// run failure) per §7 of the specification.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::PermissionTimeout { .. }
                | EngineError::PermissionMalformed { .. }
                | EngineError::NavigatorEmptyBatch { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
