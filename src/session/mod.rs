//! The agent-session abstraction (§4.1).

pub mod message;
pub mod provider;

pub use message::{Message, RingBuffer, Speaker};
pub use provider::{
    AgentProvider, AllowedTools, ContentPart, GuardDecision, GuardOptions, PermissionGuard,
    ProviderConfig, ProviderMessage, ProviderMessageKind, SystemSubtype,
};
