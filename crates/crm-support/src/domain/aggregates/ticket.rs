//! Ticket Aggregate
//!
//! Aggregate root for a support ticket. Owns the status history, the
//! escalation history and the comment thread; all three are append-only.
//!
//! Invariants held after every public mutation:
//! - `status` equals the status of the last `status_history` entry
//! - `escalation_level` equals `escalation_history.len()`
//! - SLA deadlines are applied at most once

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::EscalationRule;
use crate::domain::events::{DomainEvent, TicketEvent};
use crate::domain::services::DueDates;
use crate::domain::value_objects::{Channel, EntityId, Priority, TicketNumber, TicketStatus};

/// Ticket aggregate root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    id: EntityId,
    number: TicketNumber,
    subject: String,
    description: String,
    channel: Channel,
    priority: Priority,
    status: TicketStatus,
    status_history: Vec<StatusChange>,
    sla_policy_id: Option<EntityId>,
    response_due_at: Option<DateTime<Utc>>,
    due_at: Option<DateTime<Utc>>,
    first_response_at: Option<DateTime<Utc>>,
    assigned_to: Option<EntityId>,
    assigned_group: Option<EntityId>,
    escalation_level: u32,
    escalated_to: Option<EntityId>,
    escalation_history: Vec<EscalationEntry>,
    comments: Vec<Comment>,
    created_by: EntityId,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Input for [`Ticket::create`]
#[derive(Clone, Debug)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub channel: Channel,
    pub priority: Priority,
    pub created_by: EntityId,
}

impl Ticket {
    /// Open a new ticket in status `new` with its initial history entry.
    pub fn create(number: TicketNumber, new: NewTicket, now: DateTime<Utc>) -> Result<Self, TicketError> {
        let subject = new.subject.trim().to_string();
        if subject.is_empty() {
            return Err(TicketError::EmptySubject);
        }

        let id = EntityId::new();
        let mut ticket = Self {
            id: id.clone(),
            number,
            subject,
            description: new.description,
            channel: new.channel,
            priority: new.priority,
            status: TicketStatus::New,
            status_history: vec![StatusChange {
                status: TicketStatus::New,
                changed_by: new.created_by.clone(),
                changed_at: now,
                comment: Some("Ticket created".into()),
            }],
            sla_policy_id: None,
            response_due_at: None,
            due_at: None,
            first_response_at: None,
            assigned_to: None,
            assigned_group: None,
            escalation_level: 0,
            escalated_to: None,
            escalation_history: vec![],
            comments: vec![],
            created_by: new.created_by.clone(),
            version: 0,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            closed_at: None,
            events: vec![],
        };

        ticket.raise_event(DomainEvent::Ticket(TicketEvent::Created {
            ticket_id: id,
            number,
            priority: new.priority,
            channel: new.channel,
            created_by: new.created_by,
            created_at: now,
        }));

        Ok(ticket)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> &EntityId { &self.id }
    pub fn number(&self) -> TicketNumber { self.number }
    pub fn subject(&self) -> &str { &self.subject }
    pub fn description(&self) -> &str { &self.description }
    pub fn channel(&self) -> Channel { self.channel }
    pub fn priority(&self) -> Priority { self.priority }
    pub fn status(&self) -> TicketStatus { self.status }
    pub fn status_history(&self) -> &[StatusChange] { &self.status_history }
    pub fn sla_policy_id(&self) -> Option<&EntityId> { self.sla_policy_id.as_ref() }
    pub fn response_due_at(&self) -> Option<DateTime<Utc>> { self.response_due_at }
    pub fn due_at(&self) -> Option<DateTime<Utc>> { self.due_at }
    pub fn first_response_at(&self) -> Option<DateTime<Utc>> { self.first_response_at }
    pub fn assigned_to(&self) -> Option<&EntityId> { self.assigned_to.as_ref() }
    pub fn assigned_group(&self) -> Option<&EntityId> { self.assigned_group.as_ref() }
    pub fn escalation_level(&self) -> u32 { self.escalation_level }
    pub fn escalated_to(&self) -> Option<&EntityId> { self.escalated_to.as_ref() }
    pub fn escalation_history(&self) -> &[EscalationEntry] { &self.escalation_history }
    pub fn comments(&self) -> &[Comment] { &self.comments }
    pub fn created_by(&self) -> &EntityId { &self.created_by }
    pub fn version(&self) -> u64 { self.version }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn resolved_at(&self) -> Option<DateTime<Utc>> { self.resolved_at }
    pub fn closed_at(&self) -> Option<DateTime<Utc>> { self.closed_at }
    pub fn is_open(&self) -> bool { !self.status.is_done() }

    /// Most recent escalation caused by the given rule, if any
    pub fn last_escalation_by(&self, rule_id: &EntityId) -> Option<&EscalationEntry> {
        self.escalation_history
            .iter()
            .rev()
            .find(|entry| &entry.rule_id == rule_id)
    }

    // =========================================================================
    // Business Operations
    // =========================================================================

    /// Stamp SLA deadlines derived from a policy. Only allowed once.
    pub fn apply_sla(&mut self, policy_id: EntityId, due: DueDates) -> Result<(), TicketError> {
        if self.sla_policy_id.is_some() {
            return Err(TicketError::SlaAlreadyApplied);
        }

        self.sla_policy_id = Some(policy_id);
        self.response_due_at = Some(due.response_due_at);
        self.due_at = Some(due.due_at);
        Ok(())
    }

    /// Move the ticket to `status`. Every status is a legal target,
    /// including re-entering the current one or leaving `closed`.
    pub fn transition(
        &mut self,
        status: TicketStatus,
        actor: EntityId,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> StatusChange {
        let previous = self.status;
        let change = StatusChange {
            status,
            changed_by: actor.clone(),
            changed_at: now,
            comment,
        };

        self.apply_status_change(&change);

        self.raise_event(DomainEvent::Ticket(TicketEvent::StatusChanged {
            ticket_id: self.id.clone(),
            from: previous,
            to: status,
            changed_by: actor,
            changed_at: now,
        }));

        change
    }

    /// Apply an already-built history entry. Used by repositories replaying a
    /// status write against their stored copy.
    pub fn apply_status_change(&mut self, change: &StatusChange) {
        match change.status {
            TicketStatus::Resolved => self.resolved_at = Some(change.changed_at),
            TicketStatus::Closed => self.closed_at = Some(change.changed_at),
            _ => {}
        }

        self.status = change.status;
        self.status_history.push(change.clone());
        self.touch(change.changed_at);
    }

    /// Assign to an agent and/or group. A `new` ticket becomes `open`.
    pub fn assign(
        &mut self,
        assigned_to: Option<EntityId>,
        assigned_group: Option<EntityId>,
        actor: EntityId,
        now: DateTime<Utc>,
    ) -> Result<(), TicketError> {
        if assigned_to.is_none() && assigned_group.is_none() {
            return Err(TicketError::EmptyAssignment);
        }

        let previous_assignee = self.assigned_to.clone();
        self.assigned_to = assigned_to.clone();
        self.assigned_group = assigned_group.clone();
        self.touch(now);

        self.raise_event(DomainEvent::Ticket(TicketEvent::Assigned {
            ticket_id: self.id.clone(),
            previous_assignee,
            assigned_to,
            assigned_group,
            assigned_by: actor.clone(),
        }));

        if self.status == TicketStatus::New {
            self.transition(TicketStatus::Open, actor, Some("Assigned".into()), now);
        }

        Ok(())
    }

    /// Append a comment. The first public comment stamps `first_response_at`;
    /// later comments never move it.
    pub fn add_comment(
        &mut self,
        author_id: EntityId,
        body: impl Into<String>,
        is_internal: bool,
        now: DateTime<Utc>,
    ) -> Result<Comment, TicketError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(TicketError::EmptyComment);
        }

        let comment = Comment {
            id: EntityId::new(),
            author_id: author_id.clone(),
            body,
            is_internal,
            created_at: now,
        };

        self.raise_event(DomainEvent::Ticket(TicketEvent::CommentAdded {
            ticket_id: self.id.clone(),
            comment_id: comment.id.clone(),
            author_id,
            is_internal,
        }));

        if !is_internal && self.first_response_at.is_none() {
            self.first_response_at = Some(now);
            self.raise_event(DomainEvent::Ticket(TicketEvent::FirstResponse {
                ticket_id: self.id.clone(),
                responded_at: now,
            }));
        }

        self.comments.push(comment.clone());
        self.touch(now);

        Ok(comment)
    }

    /// Edit subject, description or priority. Deadlines already stamped are
    /// left as they are.
    pub fn update_details(
        &mut self,
        subject: Option<String>,
        description: Option<String>,
        priority: Option<Priority>,
        now: DateTime<Utc>,
    ) -> Result<(), TicketError> {
        if let Some(subject) = &subject {
            if subject.trim().is_empty() {
                return Err(TicketError::EmptySubject);
            }
        }

        let previous_priority = self.priority;
        if let Some(subject) = subject {
            self.subject = subject.trim().to_string();
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(priority) = priority {
            self.priority = priority;
        }
        self.touch(now);

        if previous_priority != self.priority {
            self.raise_event(DomainEvent::Ticket(TicketEvent::PriorityChanged {
                ticket_id: self.id.clone(),
                from: previous_priority,
                to: self.priority,
            }));
        }

        Ok(())
    }

    /// Escalate under `rule`: builds the next history entry, applies it and
    /// raises an event. The returned entry is what repositories persist.
    pub fn escalate(&mut self, rule: &EscalationRule, now: DateTime<Utc>) -> EscalationEntry {
        let previous_escalated_to = self.escalated_to.clone();
        let entry = EscalationEntry {
            level: self.escalation_level + 1,
            escalated_to: rule.escalate_to().clone(),
            escalated_at: now,
            reason: format!("Escalated by rule: {}", rule.name()),
            rule_id: rule.id().clone(),
        };

        self.push_escalation(&entry);

        self.raise_event(DomainEvent::Ticket(TicketEvent::Escalated {
            ticket_id: self.id.clone(),
            rule_id: entry.rule_id.clone(),
            from_level: entry.level - 1,
            to_level: entry.level,
            previous_escalated_to,
            escalated_to: entry.escalated_to.clone(),
            escalated_at: now,
        }));

        entry
    }

    /// Apply an escalation entry. Level counter, target and history change
    /// together or not at all.
    pub fn record_escalation(&mut self, entry: &EscalationEntry) -> Result<(), TicketError> {
        let expected = self.escalation_level + 1;
        if entry.level != expected {
            return Err(TicketError::EscalationLevelMismatch {
                expected,
                actual: entry.level,
            });
        }

        self.push_escalation(entry);
        Ok(())
    }

    fn push_escalation(&mut self, entry: &EscalationEntry) {
        self.escalation_level = entry.level;
        self.escalated_to = Some(entry.escalated_to.clone());
        self.escalation_history.push(entry.clone());
        self.touch(entry.escalated_at);
    }

    /// Repositories stamp the stored version after a successful write.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise_event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TicketStatus,
    pub changed_by: EntityId,
    pub changed_at: DateTime<Utc>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationEntry {
    pub level: u32,
    pub escalated_to: EntityId,
    pub escalated_at: DateTime<Utc>,
    pub reason: String,
    pub rule_id: EntityId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: EntityId,
    pub author_id: EntityId,
    pub body: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    EmptySubject,
    EmptyComment,
    EmptyAssignment,
    SlaAlreadyApplied,
    EscalationLevelMismatch { expected: u32, actual: u32 },
}

impl std::error::Error for TicketError {}

impl std::fmt::Display for TicketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySubject => write!(f, "Ticket subject must not be empty"),
            Self::EmptyComment => write!(f, "Comment body must not be empty"),
            Self::EmptyAssignment => write!(f, "Assignment needs an agent or a group"),
            Self::SlaAlreadyApplied => write!(f, "SLA deadlines are already set"),
            Self::EscalationLevelMismatch { expected, actual } => {
                write!(f, "Escalation level mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}
