//! Escalation rule administration and execution

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::dto::{CreateEscalationRuleCommand, UpdateEscalationRuleCommand};
use crate::application::record_events;
use crate::application::retry::Transient;
use crate::domain::aggregates::{EscalationCondition, EscalationRule, Ticket};
use crate::domain::value_objects::{EntityId, Priority, TicketStatus};
use crate::ports::inbound::{EscalationRuleUseCases, UseCaseError};
use crate::ports::outbound::{
    AuditLog, Clock, EscalationRuleRepository, Notification, NotificationKind, NotificationService,
    RepositoryError, TicketRepository,
};

// =============================================================================
// Executor
// =============================================================================

/// Applies one rule to one ticket
pub struct EscalationExecutor {
    tickets: Arc<dyn TicketRepository>,
    notifications: Arc<dyn NotificationService>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl EscalationExecutor {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        notifications: Arc<dyn NotificationService>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { tickets, notifications, audit, clock }
    }

    /// Escalate `ticket` under `rule` with a single conditional write against
    /// the snapshot's version. Returns the stored ticket so callers can chain
    /// further rules on it.
    pub async fn execute_escalation(
        &self,
        ticket: &Ticket,
        rule: &EscalationRule,
    ) -> Result<Ticket, EscalationError> {
        let mut snapshot = ticket.clone();
        // only this escalation's events are audited
        snapshot.take_events();
        let entry = snapshot.escalate(rule, self.clock.now());
        let events = snapshot.take_events();

        let stored = self
            .tickets
            .apply_escalation(ticket.id(), ticket.version(), &entry)
            .await?;

        record_events(self.audit.as_ref(), events).await;

        info!(
            ticket_id = %stored.id(),
            rule_id = %rule.id(),
            level = entry.level,
            escalated_to = %entry.escalated_to,
            "Ticket escalated"
        );

        self.notify(&stored, rule).await;
        Ok(stored)
    }

    async fn notify(&self, ticket: &Ticket, rule: &EscalationRule) {
        let notification = Notification {
            user_id: rule.escalate_to().clone(),
            title: format!("Ticket {} escalated", ticket.number()),
            message: format!(
                "\"{}\" reached escalation level {} ({})",
                ticket.subject(),
                ticket.escalation_level(),
                rule.name()
            ),
            kind: NotificationKind::Escalation,
            link: format!("/tickets/{}", ticket.id()),
        };

        if let Err(e) = self.notifications.create_notification(notification).await {
            warn!(ticket_id = %ticket.id(), rule_id = %rule.id(), error = %e, "Escalation notification failed");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscalationError {
    /// Another writer changed the ticket since it was read
    #[error("ticket {ticket_id} changed concurrently (expected version {expected}, found {found})")]
    Conflict { ticket_id: String, expected: u64, found: u64 },

    #[error("escalation write failed: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for EscalationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { id, expected, found } => Self::Conflict { ticket_id: id, expected, found },
            other => Self::Repository(other),
        }
    }
}

impl Transient for EscalationError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Repository(e) if e.is_transient())
    }
}

// =============================================================================
// Rule administration
// =============================================================================

/// Escalation rule application service
pub struct EscalationRuleService {
    rules: Arc<dyn EscalationRuleRepository>,
    clock: Arc<dyn Clock>,
}

impl EscalationRuleService {
    pub fn new(rules: Arc<dyn EscalationRuleRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { rules, clock }
    }

    async fn load(&self, rule_id: &str) -> Result<EscalationRule, UseCaseError> {
        let id = EntityId::parse(rule_id)?;
        self.rules
            .find_by_id(&id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("escalation rule {}", rule_id)))
    }
}

fn required(field: &str, value: String) -> Result<String, UseCaseError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(UseCaseError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(value)
}

#[async_trait]
impl EscalationRuleUseCases for EscalationRuleService {
    async fn create_rule(&self, command: CreateEscalationRuleCommand) -> Result<EscalationRule, UseCaseError> {
        let name = required("name", command.name)?;
        let escalate_to = required("escalate_to", command.escalate_to)?;
        let condition: EscalationCondition = command.condition_type.parse()?;
        let priority = command.priority.as_deref().map(str::parse::<Priority>).transpose()?;
        let status = command.status.as_deref().map(str::parse::<TicketStatus>).transpose()?;
        let now = self.clock.now();

        let mut rule = EscalationRule::new(
            name,
            condition,
            command.escalate_after_minutes,
            EntityId::from_string(escalate_to),
            now,
        );
        if let Some(priority) = priority {
            rule = rule.with_priority(priority);
        }
        if let Some(status) = status {
            rule = rule.with_status(status);
        }
        if let Some(active) = command.is_active {
            rule.set_active(active, now);
        }

        self.rules.save(&rule).await?;
        info!(rule_id = %rule.id(), %condition, after_minutes = rule.escalate_after_minutes(), "Escalation rule created");
        Ok(rule)
    }

    async fn get_rule(&self, rule_id: &str) -> Result<EscalationRule, UseCaseError> {
        self.load(rule_id).await
    }

    async fn list_rules(&self) -> Result<Vec<EscalationRule>, UseCaseError> {
        Ok(self.rules.list().await?)
    }

    async fn update_rule(&self, command: UpdateEscalationRuleCommand) -> Result<EscalationRule, UseCaseError> {
        let mut rule = self.load(&command.rule_id).await?;

        let name = command.name.map(|n| required("name", n)).transpose()?;
        let escalate_to = command
            .escalate_to
            .map(|to| required("escalate_to", to).map(EntityId::from_string))
            .transpose()?;
        let condition = command
            .condition_type
            .as_deref()
            .map(str::parse::<EscalationCondition>)
            .transpose()?;
        let priority = command
            .priority
            .map(|p| p.as_deref().map(str::parse::<Priority>).transpose())
            .transpose()?;
        let status = command
            .status
            .map(|s| s.as_deref().map(str::parse::<TicketStatus>).transpose())
            .transpose()?;
        let now = self.clock.now();

        rule.update(name, priority, status, condition, command.escalate_after_minutes, escalate_to, now);
        if let Some(active) = command.is_active {
            rule.set_active(active, now);
        }

        self.rules.save(&rule).await?;
        info!(rule_id = %rule.id(), "Escalation rule updated");
        Ok(rule)
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<(), UseCaseError> {
        let id = EntityId::parse(rule_id)?;
        self.rules.delete(&id).await?;
        info!(rule_id = %id, "Escalation rule deleted");
        Ok(())
    }
}
