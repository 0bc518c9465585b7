//! Application layer
//!
//! Orchestrates use cases and coordinates domain objects.

pub mod dto;
pub mod tickets;
pub mod sla;
pub mod escalation;
pub mod sweep;
mod retry;

pub use dto::*;
pub use tickets::TicketService;
pub use sla::{SlaPolicyResolver, SlaPolicyService};
pub use escalation::{EscalationError, EscalationExecutor, EscalationRuleService};
pub use sweep::{EscalationSweep, SweepError, SweepOutcome, SweepReport};

use tracing::warn;

use crate::domain::events::DomainEvent;
use crate::ports::outbound::AuditLog;

/// Audit module name for ticket records
pub const TICKETS_MODULE: &str = "tickets";

/// Turn drained domain events into audit records. Audit failures never fail
/// the operation that produced the events.
pub(crate) async fn record_events(audit: &dyn AuditLog, events: Vec<DomainEvent>) {
    for event in events {
        let (action, changes) = event.audit_changes();
        if let Err(e) = audit
            .log_change(action, TICKETS_MODULE, event.aggregate_id(), changes)
            .await
        {
            warn!(
                event = event.event_type(),
                record_id = %event.aggregate_id(),
                error = %e,
                "Audit write failed"
            );
        }
    }
}
