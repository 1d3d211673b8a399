//! Identifier newtypes shared across the tracker, broker, and controllers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A tool call identifier: `TOOL_` followed by a zero-padded monotonic
/// counter (§4.2). Unique per run, strictly increasing (§8 P5).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolId(String);

impl ToolId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates strictly increasing [`ToolId`]s for a single run. Owned by the
/// [`crate::tool::ToolTracker`] that uses it — never a process-wide
/// singleton (REDESIGN FLAGS: no implicit per-request singletons).
#[derive(Debug, Default)]
pub struct ToolIdAllocator {
    counter: AtomicU64,
}

impl ToolIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> ToolId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        ToolId(format!("TOOL_{:06}", n))
    }
}

/// A freshly generated permission-request identifier (§3 PermissionRequest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap a `requestId` string observed on the wire (e.g. echoed back by
    /// a Navigator `approve`/`deny` command) without generating a new one.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_ids_are_strictly_increasing_and_zero_padded() {
        let alloc = ToolIdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert_eq!(a.as_str(), "TOOL_000001");
        assert_eq!(b.as_str(), "TOOL_000002");
        assert!(a < b);
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
