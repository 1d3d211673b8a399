//! The permission gate (§4.3).

pub mod broker;
pub mod request;

pub use broker::PermissionBroker;
pub use request::{PermissionDecision, PermissionOutcome, PermissionRequest};
