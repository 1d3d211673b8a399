//! The engine-level transcript message (§3 Message).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Who produced a [`Message`]: user, assistant, or system — distinct from
/// [`Role`], which says *which session* (architect/driver/navigator)
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
    System,
}

/// A single entry in the loop's observability transcript.
///
/// Emitted once by an agent session and never mutated afterwards; logged
/// and optionally displayed by the embedder. Not to be confused with
/// [`crate::session::provider::ProviderMessage`], the richer structured
/// message an [`crate::session::provider::AgentProvider`] yields — `Message`
/// is the flattened, display-oriented record the loop keeps in its ring
/// buffers (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub session_role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(speaker: Speaker, session_role: Role, content: impl Into<String>) -> Self {
        Self {
            speaker,
            session_role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A small fixed-capacity ring, oldest evicted on push (§3.1). Exists for
/// observability/debugging, not replay — not a generic crate dependency.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(item);
    }

    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut ring: RingBuffer<i32> = RingBuffer::with_capacity(3);
        for i in 0..5 {
            ring.push(i);
        }
        assert_eq!(ring.snapshot(), vec![2, 3, 4]);
    }
}
