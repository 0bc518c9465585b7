//! Aggregates module

pub mod ticket;
pub mod sla_policy;
pub mod escalation_rule;

pub use ticket::{Ticket, TicketError, NewTicket, StatusChange, EscalationEntry, Comment};
pub use sla_policy::{SlaPolicy, SlaPolicyError};
pub use escalation_rule::{EscalationRule, EscalationCondition};
