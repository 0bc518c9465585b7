//! Data Transfer Objects (DTOs)
//!
//! Commands arrive with raw text for ids and enum values; the services parse
//! them so bad input surfaces as `InvalidIdentifier` / `ValidationError`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::Ticket;
use crate::domain::services::{BreachDetector, BreachKind};
use crate::ports::outbound::{SortOrder, TicketFilter, TicketSortField};

// =============================================================================
// Ticket Commands
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTicketCommand {
    pub subject: String,
    pub description: String,
    pub channel: String,
    pub priority: String,
    /// Omitted for automated intake; the configured system user is used
    pub created_by: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateTicketCommand {
    pub ticket_id: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub actor: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateStatusCommand {
    pub ticket_id: String,
    pub status: String,
    pub comment: Option<String>,
    pub actor: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignTicketCommand {
    pub ticket_id: String,
    pub assigned_to: Option<String>,
    pub assigned_group: Option<String>,
    pub actor: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddCommentCommand {
    pub ticket_id: String,
    pub author_id: String,
    pub body: String,
    pub is_internal: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListTicketsQuery {
    #[serde(default)]
    pub filter: TicketFilter,
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub sort_by: TicketSortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for ListTicketsQuery {
    fn default() -> Self {
        Self {
            filter: TicketFilter::default(),
            page: 1,
            limit: 50,
            sort_by: TicketSortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

// =============================================================================
// SLA Policy Commands
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSlaPolicyCommand {
    pub name: String,
    pub priority: String,
    pub response_time_minutes: u32,
    pub resolution_time_minutes: u32,
    #[serde(default)]
    pub is_business_hours_only: bool,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateSlaPolicyCommand {
    pub policy_id: String,
    pub name: Option<String>,
    pub priority: Option<String>,
    pub response_time_minutes: Option<u32>,
    pub resolution_time_minutes: Option<u32>,
    pub is_business_hours_only: Option<bool>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Escalation Rule Commands
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEscalationRuleCommand {
    pub name: String,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub condition_type: String,
    pub escalate_after_minutes: u32,
    pub escalate_to: String,
    pub is_active: Option<bool>,
}

/// `Some(None)` on a filter clears it
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateEscalationRuleCommand {
    pub rule_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<Option<String>>,
    pub condition_type: Option<String>,
    pub escalate_after_minutes: Option<u32>,
    pub escalate_to: Option<String>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Views (Read Models)
// =============================================================================

/// Dashboard row for a ticket in breach
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverdueTicketView {
    pub id: String,
    pub number: String,
    pub subject: String,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<String>,
    pub response_due_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub response_breached: bool,
    pub resolution_breached: bool,
    pub escalation_level: u32,
}

impl OverdueTicketView {
    pub fn from_ticket(ticket: &Ticket, now: DateTime<Utc>) -> Self {
        let kind = BreachDetector::breach_kind(ticket, now);
        Self {
            id: ticket.id().to_string(),
            number: ticket.number().to_string(),
            subject: ticket.subject().to_string(),
            status: ticket.status().to_string(),
            priority: ticket.priority().to_string(),
            assigned_to: ticket.assigned_to().map(|a| a.to_string()),
            response_due_at: ticket.response_due_at(),
            due_at: ticket.due_at(),
            response_breached: matches!(kind, Some(BreachKind::Response | BreachKind::Both)),
            resolution_breached: matches!(kind, Some(BreachKind::Resolution | BreachKind::Both)),
            escalation_level: ticket.escalation_level(),
        }
    }
}
