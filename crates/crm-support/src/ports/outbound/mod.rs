//! Outbound ports (Repository traits)
//!
//! Hexagonal architecture: these are the interfaces that infrastructure must implement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{EscalationEntry, EscalationRule, SlaPolicy, StatusChange, Ticket};
use crate::domain::events::{ChangeAction, FieldChange};
use crate::domain::value_objects::{Channel, EntityId, Priority, TicketNumber, TicketStatus};

/// Repository result type
pub type RepoResult<T> = Result<T, RepositoryError>;

// =============================================================================
// Tickets
// =============================================================================

/// Filter for ticket listings; unset fields match everything
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TicketFilter {
    pub statuses: Option<Vec<TicketStatus>>,
    pub priority: Option<Priority>,
    pub channel: Option<Channel>,
    pub assigned_to: Option<EntityId>,
    pub escalated_only: bool,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.statuses.as_ref().map_or(true, |s| s.contains(&ticket.status()))
            && self.priority.map_or(true, |p| p == ticket.priority())
            && self.channel.map_or(true, |c| c == ticket.channel())
            && self.assigned_to.as_ref().map_or(true, |a| ticket.assigned_to() == Some(a))
            && (!self.escalated_only || ticket.escalation_level() > 0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Number,
    Priority,
    DueAt,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// One page of a ticket listing plus the total match count
#[derive(Clone, Debug, Default)]
pub struct TicketListing {
    pub tickets: Vec<Ticket>,
    pub total: u64,
}

/// Position in the open-ticket scan: tickets are ordered by `(created_at, id)`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SweepCursor {
    pub created_at: DateTime<Utc>,
    pub id: EntityId,
}

impl SweepCursor {
    pub fn after(ticket: &Ticket) -> Self {
        Self { created_at: ticket.created_at(), id: ticket.id().clone() }
    }
}

/// One batch of open tickets
#[derive(Clone, Debug, Default)]
pub struct TicketPage {
    pub tickets: Vec<Ticket>,
    /// `None` once the scan is exhausted
    pub next: Option<SweepCursor>,
}

/// Ticket repository port
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Filtered, sorted listing. `page` is 1-based.
    async fn find_all(
        &self,
        filter: &TicketFilter,
        page: u32,
        limit: u32,
        sort_by: TicketSortField,
        sort_order: SortOrder,
    ) -> RepoResult<TicketListing>;

    /// Find ticket by ID
    async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<Ticket>>;

    /// Insert a freshly created ticket
    async fn insert(&self, ticket: &Ticket) -> RepoResult<()>;

    /// Replace the stored document if its version is still `expected_version`
    async fn update(&self, ticket: &Ticket, expected_version: u64) -> RepoResult<Ticket>;

    /// Set status and append the history entry in one write
    async fn update_status(
        &self,
        id: &EntityId,
        change: &StatusChange,
        expected_version: u64,
    ) -> RepoResult<Ticket>;

    /// Bump the escalation level, set the target and append the history
    /// entry in one conditional write
    async fn apply_escalation(
        &self,
        id: &EntityId,
        expected_version: u64,
        entry: &EscalationEntry,
    ) -> RepoResult<Ticket>;

    /// Tickets currently in breach of either SLA deadline
    async fn find_overdue_sla(&self, now: DateTime<Utc>) -> RepoResult<Vec<Ticket>>;

    /// Next batch of tickets not in {resolved, closed}, strictly after `after`
    async fn find_open_page(&self, after: Option<&SweepCursor>, limit: usize) -> RepoResult<TicketPage>;

    /// Allocate the next human ticket number
    async fn next_ticket_number(&self) -> RepoResult<TicketNumber>;

    /// Delete ticket
    async fn delete(&self, id: &EntityId) -> RepoResult<()>;
}

// =============================================================================
// Policies & Rules
// =============================================================================

/// SLA policy repository port
#[async_trait]
pub trait SlaPolicyRepository: Send + Sync {
    /// First active policy for the priority, if any
    async fn find_by_priority(&self, priority: Priority) -> RepoResult<Option<SlaPolicy>>;

    async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<SlaPolicy>>;

    async fn list(&self) -> RepoResult<Vec<SlaPolicy>>;

    async fn save(&self, policy: &SlaPolicy) -> RepoResult<()>;

    async fn delete(&self, id: &EntityId) -> RepoResult<()>;
}

/// Escalation rule repository port
#[async_trait]
pub trait EscalationRuleRepository: Send + Sync {
    /// All active rules in a stable order
    async fn find_active(&self) -> RepoResult<Vec<EscalationRule>>;

    async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<EscalationRule>>;

    async fn list(&self) -> RepoResult<Vec<EscalationRule>>;

    async fn save(&self, rule: &EscalationRule) -> RepoResult<()>;

    async fn delete(&self, id: &EntityId) -> RepoResult<()>;
}

// =============================================================================
// Collaborators
// =============================================================================

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Escalation,
}

/// In-app notification addressed to one user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: EntityId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: String,
}

/// Notification delivery port
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn create_notification(&self, notification: Notification) -> Result<(), CollaboratorError>;
}

/// Audit trail port
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn log_change(
        &self,
        action: ChangeAction,
        module: &str,
        record_id: &EntityId,
        changes: Vec<FieldChange>,
    ) -> Result<(), CollaboratorError>;
}

// =============================================================================
// Errors
// =============================================================================

/// Repository errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("version conflict on {id}: expected {expected}, found {found}")]
    Conflict { id: String, expected: u64, found: u64 },

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl RepositoryError {
    /// Worth retrying after a pause
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}

/// Failure of a best-effort collaborator (notifications, audit)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{collaborator} unavailable: {reason}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::NewTicket;

    fn ticket(priority: Priority) -> Ticket {
        Ticket::create(
            TicketNumber::new(1),
            NewTicket {
                subject: "s".into(),
                description: String::new(),
                channel: Channel::Chat,
                priority,
                created_by: EntityId::new(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_filter_matching() {
        let t = ticket(Priority::High);
        assert!(TicketFilter::default().matches(&t));
        assert!(TicketFilter { priority: Some(Priority::High), ..Default::default() }.matches(&t));
        assert!(!TicketFilter { channel: Some(Channel::Phone), ..Default::default() }.matches(&t));
        assert!(!TicketFilter { escalated_only: true, ..Default::default() }.matches(&t));
        assert!(TicketFilter {
            statuses: Some(vec![TicketStatus::New, TicketStatus::Open]),
            ..Default::default()
        }
        .matches(&t));
    }

    #[test]
    fn test_only_connection_errors_are_transient() {
        assert!(RepositoryError::ConnectionError("reset".into()).is_transient());
        assert!(!RepositoryError::QueryError("bad".into()).is_transient());
        assert!(!RepositoryError::Conflict { id: "t".into(), expected: 1, found: 2 }.is_transient());
    }
}
