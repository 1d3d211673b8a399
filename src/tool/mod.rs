//! Tool-call tracking (§4.2).

pub mod call;
pub mod reviewable;
pub mod tracker;

pub use call::{ReviewOutcome, ToolCall, ToolStatus};
pub use reviewable::is_reviewable;
pub use tracker::{requires_driver_review, ToolTracker};
