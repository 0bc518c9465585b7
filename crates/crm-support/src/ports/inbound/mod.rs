//! Inbound ports (Use case traits)
//!
//! Hexagonal architecture: application service interfaces consumed by the
//! REST layer.

use async_trait::async_trait;

use crate::application::dto::*;
use crate::domain::aggregates::{EscalationRule, SlaPolicy, Ticket};
use crate::domain::value_objects::ValueError;
use crate::ports::outbound::{RepositoryError, TicketListing};

/// Ticket lifecycle use cases
#[async_trait]
pub trait TicketUseCases: Send + Sync {
    async fn create_ticket(&self, command: CreateTicketCommand) -> Result<Ticket, UseCaseError>;

    async fn get_ticket(&self, ticket_id: &str) -> Result<Ticket, UseCaseError>;

    async fn list_tickets(&self, query: ListTicketsQuery) -> Result<TicketListing, UseCaseError>;

    async fn update_ticket(&self, command: UpdateTicketCommand) -> Result<Ticket, UseCaseError>;

    /// Move a ticket to a new status
    async fn update_status(&self, command: UpdateStatusCommand) -> Result<Ticket, UseCaseError>;

    async fn assign_ticket(&self, command: AssignTicketCommand) -> Result<Ticket, UseCaseError>;

    async fn add_comment(&self, command: AddCommentCommand) -> Result<Ticket, UseCaseError>;

    async fn delete_ticket(&self, ticket_id: &str) -> Result<(), UseCaseError>;

    /// Whether the ticket is currently in breach of its SLA
    async fn check_sla_breach(&self, ticket_id: &str) -> Result<bool, UseCaseError>;

    /// Every ticket currently in breach (read-only)
    async fn get_overdue_sla_tickets(&self) -> Result<Vec<OverdueTicketView>, UseCaseError>;
}

/// SLA policy administration
#[async_trait]
pub trait SlaPolicyUseCases: Send + Sync {
    async fn create_policy(&self, command: CreateSlaPolicyCommand) -> Result<SlaPolicy, UseCaseError>;

    async fn get_policy(&self, policy_id: &str) -> Result<SlaPolicy, UseCaseError>;

    async fn list_policies(&self) -> Result<Vec<SlaPolicy>, UseCaseError>;

    async fn update_policy(&self, command: UpdateSlaPolicyCommand) -> Result<SlaPolicy, UseCaseError>;

    async fn delete_policy(&self, policy_id: &str) -> Result<(), UseCaseError>;
}

/// Escalation rule administration
#[async_trait]
pub trait EscalationRuleUseCases: Send + Sync {
    async fn create_rule(&self, command: CreateEscalationRuleCommand) -> Result<EscalationRule, UseCaseError>;

    async fn get_rule(&self, rule_id: &str) -> Result<EscalationRule, UseCaseError>;

    async fn list_rules(&self) -> Result<Vec<EscalationRule>, UseCaseError>;

    async fn update_rule(&self, command: UpdateEscalationRuleCommand) -> Result<EscalationRule, UseCaseError>;

    async fn delete_rule(&self, rule_id: &str) -> Result<(), UseCaseError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UseCaseError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("access denied")]
    AccessDenied,

    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for UseCaseError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            other => Self::Repository(other),
        }
    }
}

impl From<ValueError> for UseCaseError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::InvalidIdentifier(id) => Self::InvalidIdentifier(id),
            other => Self::ValidationError(other.to_string()),
        }
    }
}
