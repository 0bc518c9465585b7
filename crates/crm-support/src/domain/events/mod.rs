//! Domain Events
//!
//! Events raised by the ticket aggregate. The application layer drains them
//! after a successful write and turns them into audit change records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::value_objects::{Channel, EntityId, Priority, TicketNumber, TicketStatus};

/// All domain events in the support bounded context
#[derive(Clone, Debug)]
pub enum DomainEvent {
    Ticket(TicketEvent),
}

/// Ticket-related domain events
#[derive(Clone, Debug)]
pub enum TicketEvent {
    Created {
        ticket_id: EntityId,
        number: TicketNumber,
        priority: Priority,
        channel: Channel,
        created_by: EntityId,
        created_at: DateTime<Utc>,
    },

    StatusChanged {
        ticket_id: EntityId,
        from: TicketStatus,
        to: TicketStatus,
        changed_by: EntityId,
        changed_at: DateTime<Utc>,
    },

    Assigned {
        ticket_id: EntityId,
        previous_assignee: Option<EntityId>,
        assigned_to: Option<EntityId>,
        assigned_group: Option<EntityId>,
        assigned_by: EntityId,
    },

    CommentAdded {
        ticket_id: EntityId,
        comment_id: EntityId,
        author_id: EntityId,
        is_internal: bool,
    },

    FirstResponse {
        ticket_id: EntityId,
        responded_at: DateTime<Utc>,
    },

    PriorityChanged {
        ticket_id: EntityId,
        from: Priority,
        to: Priority,
    },

    Escalated {
        ticket_id: EntityId,
        rule_id: EntityId,
        from_level: u32,
        to_level: u32,
        previous_escalated_to: Option<EntityId>,
        escalated_to: EntityId,
        escalated_at: DateTime<Utc>,
    },
}

/// Kind of change recorded in the audit trail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
    StatusChange,
    Assign,
    Comment,
    Escalate,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::StatusChange => "status_change",
            Self::Assign => "assign",
            Self::Comment => "comment",
            Self::Escalate => "escalate",
        }
    }
}

/// One field's old and new value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, old: Value, new: Value) -> Self {
        Self { field: field.into(), old, new }
    }
}

fn opt_id(id: &Option<EntityId>) -> Value {
    id.as_ref().map(|i| json!(i.as_str())).unwrap_or(Value::Null)
}

impl DomainEvent {
    /// Get the aggregate ID this event belongs to
    pub fn aggregate_id(&self) -> &EntityId {
        match self {
            DomainEvent::Ticket(e) => match e {
                TicketEvent::Created { ticket_id, .. } => ticket_id,
                TicketEvent::StatusChanged { ticket_id, .. } => ticket_id,
                TicketEvent::Assigned { ticket_id, .. } => ticket_id,
                TicketEvent::CommentAdded { ticket_id, .. } => ticket_id,
                TicketEvent::FirstResponse { ticket_id, .. } => ticket_id,
                TicketEvent::PriorityChanged { ticket_id, .. } => ticket_id,
                TicketEvent::Escalated { ticket_id, .. } => ticket_id,
            },
        }
    }

    /// Get event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Ticket(e) => match e {
                TicketEvent::Created { .. } => "ticket.created",
                TicketEvent::StatusChanged { .. } => "ticket.status_changed",
                TicketEvent::Assigned { .. } => "ticket.assigned",
                TicketEvent::CommentAdded { .. } => "ticket.comment_added",
                TicketEvent::FirstResponse { .. } => "ticket.first_response",
                TicketEvent::PriorityChanged { .. } => "ticket.priority_changed",
                TicketEvent::Escalated { .. } => "ticket.escalated",
            },
        }
    }

    /// Audit action and field changes for this event
    pub fn audit_changes(&self) -> (ChangeAction, Vec<FieldChange>) {
        match self {
            DomainEvent::Ticket(e) => match e {
                TicketEvent::Created { number, priority, channel, created_by, .. } => (
                    ChangeAction::Create,
                    vec![
                        FieldChange::new("ticket_number", Value::Null, json!(number.value())),
                        FieldChange::new("priority", Value::Null, json!(priority.as_str())),
                        FieldChange::new("channel", Value::Null, json!(channel.as_str())),
                        FieldChange::new("created_by", Value::Null, json!(created_by.as_str())),
                    ],
                ),
                TicketEvent::StatusChanged { from, to, .. } => (
                    ChangeAction::StatusChange,
                    vec![FieldChange::new("status", json!(from.as_str()), json!(to.as_str()))],
                ),
                TicketEvent::Assigned { previous_assignee, assigned_to, assigned_group, .. } => (
                    ChangeAction::Assign,
                    vec![
                        FieldChange::new("assigned_to", opt_id(previous_assignee), opt_id(assigned_to)),
                        FieldChange::new("assigned_group", Value::Null, opt_id(assigned_group)),
                    ],
                ),
                TicketEvent::CommentAdded { comment_id, is_internal, .. } => (
                    ChangeAction::Comment,
                    vec![FieldChange::new(
                        "comment",
                        Value::Null,
                        json!({ "id": comment_id.as_str(), "is_internal": is_internal }),
                    )],
                ),
                TicketEvent::FirstResponse { responded_at, .. } => (
                    ChangeAction::Update,
                    vec![FieldChange::new("first_response_at", Value::Null, json!(responded_at.to_rfc3339()))],
                ),
                TicketEvent::PriorityChanged { from, to, .. } => (
                    ChangeAction::Update,
                    vec![FieldChange::new("priority", json!(from.as_str()), json!(to.as_str()))],
                ),
                TicketEvent::Escalated { from_level, to_level, previous_escalated_to, escalated_to, .. } => (
                    ChangeAction::Escalate,
                    vec![
                        FieldChange::new("escalation_level", json!(from_level), json!(to_level)),
                        FieldChange::new("escalated_to", opt_id(previous_escalated_to), json!(escalated_to.as_str())),
                    ],
                ),
            },
        }
    }
}
