//! Value Objects module
//!
//! Immutable, validated domain primitives shared by the ticket, SLA policy
//! and escalation rule aggregates.

pub mod status;
pub mod priority;
pub mod channel;

pub use status::TicketStatus;
pub use priority::Priority;
pub use channel::Channel;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier value object for documents (UUID v4 text)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse an identifier received from outside the engine.
    pub fn parse(value: &str) -> Result<Self, ValueError> {
        let trimmed = value.trim();
        uuid::Uuid::parse_str(trimmed)
            .map(|u| Self(u.to_string()))
            .map_err(|_| ValueError::InvalidIdentifier(value.to_string()))
    }

    /// Wrap an opaque reference (user ids, group ids) without validation
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Human-facing ticket number, allocated sequentially by the repository
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketNumber(u64);

impl TicketNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TKT-{:06}", self.0)
    }
}

/// Errors raised while building value objects from raw input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid ticket status: {0}")]
    InvalidStatus(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    #[error("invalid escalation condition: {0}")]
    InvalidCondition(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_parse() {
        let id = EntityId::new();
        let parsed = EntityId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_entity_id_rejects_garbage() {
        assert_eq!(
            EntityId::parse("not-an-id"),
            Err(ValueError::InvalidIdentifier("not-an-id".into()))
        );
        assert!(EntityId::parse("").is_err());
    }

    #[test]
    fn test_ticket_number_display() {
        assert_eq!(TicketNumber::new(42).to_string(), "TKT-000042");
    }
}
