//! Infrastructure layer
//!
//! In-memory repositories and collaborator adapters.

pub mod persistence;
pub mod adapters;

pub use persistence::{InMemoryEscalationRuleRepository, InMemorySlaPolicyRepository, InMemoryTicketRepository};
pub use adapters::{
    AuditRecord, InMemoryAuditLog, InMemoryNotificationService, ManualClock, SystemClock, TracingAuditLog,
    TracingNotificationService,
};
