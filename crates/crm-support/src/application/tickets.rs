//! Ticket application service

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::application::dto::*;
use crate::application::sla::SlaPolicyResolver;
use crate::application::{record_events, TICKETS_MODULE};
use crate::config::SupportConfig;
use crate::domain::aggregates::{NewTicket, Ticket};
use crate::domain::events::ChangeAction;
use crate::domain::services::{BreachDetector, DueDateCalculator};
use crate::domain::value_objects::{Channel, EntityId, Priority, TicketStatus};
use crate::ports::inbound::{TicketUseCases, UseCaseError};
use crate::ports::outbound::{AuditLog, Clock, SlaPolicyRepository, TicketListing, TicketRepository};

/// Largest page a listing may request
pub const MAX_PAGE_LIMIT: u32 = 500;

/// Ticket application service
pub struct TicketService {
    tickets: Arc<dyn TicketRepository>,
    resolver: SlaPolicyResolver,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    system_user: EntityId,
}

impl TicketService {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        policies: Arc<dyn SlaPolicyRepository>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
        config: &SupportConfig,
    ) -> Self {
        Self {
            tickets,
            resolver: SlaPolicyResolver::new(policies),
            audit,
            clock,
            system_user: EntityId::from_string(config.system_user_id.clone()),
        }
    }

    async fn load(&self, ticket_id: &str) -> Result<Ticket, UseCaseError> {
        let id = EntityId::parse(ticket_id)?;
        self.tickets
            .find_by_id(&id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("ticket {}", ticket_id)))
    }

    /// Actor for a new ticket: explicit creator, else the system user for
    /// automated channels.
    fn creator(&self, channel: Channel, created_by: Option<String>) -> Result<EntityId, UseCaseError> {
        match non_blank(created_by) {
            Some(id) => Ok(EntityId::from_string(id)),
            None if channel.is_automated() => Ok(self.system_user.clone()),
            None => Err(UseCaseError::ValidationError(format!(
                "created_by is required for {} tickets",
                channel
            ))),
        }
    }

    /// Persist a mutated ticket under its loaded version, then audit.
    async fn save(&self, mut ticket: Ticket) -> Result<Ticket, UseCaseError> {
        let events = ticket.take_events();
        let stored = self.tickets.update(&ticket, ticket.version()).await?;
        record_events(self.audit.as_ref(), events).await;
        Ok(stored)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn actor(value: &str) -> Result<EntityId, UseCaseError> {
    non_blank(Some(value.to_string()))
        .map(EntityId::from_string)
        .ok_or_else(|| UseCaseError::ValidationError("actor is required".into()))
}

fn domain_error(e: impl std::fmt::Display) -> UseCaseError {
    UseCaseError::ValidationError(e.to_string())
}

#[async_trait]
impl TicketUseCases for TicketService {
    async fn create_ticket(&self, command: CreateTicketCommand) -> Result<Ticket, UseCaseError> {
        let channel: Channel = command.channel.parse()?;
        let priority: Priority = command.priority.parse()?;
        let created_by = self.creator(channel, command.created_by)?;

        let number = self.tickets.next_ticket_number().await?;
        let now = self.clock.now();

        let mut ticket = Ticket::create(
            number,
            NewTicket {
                subject: command.subject,
                description: command.description,
                channel,
                priority,
                created_by,
            },
            now,
        )
        .map_err(domain_error)?;

        if let Some(policy) = self.resolver.resolve(priority).await {
            let due = DueDateCalculator::calculate_due_dates(&policy, now);
            ticket.apply_sla(policy.id().clone(), due).map_err(domain_error)?;
        }

        let events = ticket.take_events();
        self.tickets.insert(&ticket).await?;
        record_events(self.audit.as_ref(), events).await;

        info!(
            ticket_id = %ticket.id(),
            number = %ticket.number(),
            %priority,
            %channel,
            sla = ticket.sla_policy_id().is_some(),
            "Ticket created"
        );
        Ok(ticket)
    }

    async fn get_ticket(&self, ticket_id: &str) -> Result<Ticket, UseCaseError> {
        self.load(ticket_id).await
    }

    async fn list_tickets(&self, query: ListTicketsQuery) -> Result<TicketListing, UseCaseError> {
        if query.page == 0 {
            return Err(UseCaseError::ValidationError("page starts at 1".into()));
        }
        if query.limit == 0 || query.limit > MAX_PAGE_LIMIT {
            return Err(UseCaseError::ValidationError(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        Ok(self
            .tickets
            .find_all(&query.filter, query.page, query.limit, query.sort_by, query.sort_order)
            .await?)
    }

    async fn update_ticket(&self, command: UpdateTicketCommand) -> Result<Ticket, UseCaseError> {
        let actor = actor(&command.actor)?;
        let priority = command.priority.as_deref().map(str::parse::<Priority>).transpose()?;
        let mut ticket = self.load(&command.ticket_id).await?;

        ticket
            .update_details(command.subject, command.description, priority, self.clock.now())
            .map_err(domain_error)?;

        let stored = self.save(ticket).await?;
        debug!(ticket_id = %stored.id(), %actor, "Ticket updated");
        Ok(stored)
    }

    async fn update_status(&self, command: UpdateStatusCommand) -> Result<Ticket, UseCaseError> {
        let status: TicketStatus = command.status.parse()?;
        let actor = actor(&command.actor)?;
        let mut ticket = self.load(&command.ticket_id).await?;
        let expected_version = ticket.version();
        let previous = ticket.status();

        let change = ticket.transition(status, actor, command.comment, self.clock.now());
        let events = ticket.take_events();

        let stored = self
            .tickets
            .update_status(ticket.id(), &change, expected_version)
            .await?;
        record_events(self.audit.as_ref(), events).await;

        info!(ticket_id = %stored.id(), from = %previous, to = %status, "Ticket status changed");
        Ok(stored)
    }

    async fn assign_ticket(&self, command: AssignTicketCommand) -> Result<Ticket, UseCaseError> {
        let actor = actor(&command.actor)?;
        let mut ticket = self.load(&command.ticket_id).await?;

        ticket
            .assign(
                non_blank(command.assigned_to).map(EntityId::from_string),
                non_blank(command.assigned_group).map(EntityId::from_string),
                actor,
                self.clock.now(),
            )
            .map_err(domain_error)?;

        let stored = self.save(ticket).await?;
        info!(
            ticket_id = %stored.id(),
            assigned_to = ?stored.assigned_to().map(EntityId::as_str),
            "Ticket assigned"
        );
        Ok(stored)
    }

    async fn add_comment(&self, command: AddCommentCommand) -> Result<Ticket, UseCaseError> {
        let author = actor(&command.author_id)?;
        let mut ticket = self.load(&command.ticket_id).await?;

        let comment = ticket
            .add_comment(author, command.body, command.is_internal, self.clock.now())
            .map_err(domain_error)?;

        let stored = self.save(ticket).await?;
        debug!(ticket_id = %stored.id(), comment_id = %comment.id, internal = comment.is_internal, "Comment added");
        Ok(stored)
    }

    async fn delete_ticket(&self, ticket_id: &str) -> Result<(), UseCaseError> {
        let id = EntityId::parse(ticket_id)?;
        self.tickets.delete(&id).await?;

        if let Err(e) = self.audit.log_change(ChangeAction::Delete, TICKETS_MODULE, &id, Vec::new()).await {
            warn!(ticket_id = %id, error = %e, "Audit write failed");
        }
        info!(ticket_id = %id, "Ticket deleted");
        Ok(())
    }

    async fn check_sla_breach(&self, ticket_id: &str) -> Result<bool, UseCaseError> {
        let ticket = self.load(ticket_id).await?;
        Ok(BreachDetector::check_sla_breach(&ticket, self.clock.now()))
    }

    async fn get_overdue_sla_tickets(&self) -> Result<Vec<OverdueTicketView>, UseCaseError> {
        let now = self.clock.now();
        let overdue = self.tickets.find_overdue_sla(now).await?;
        Ok(overdue.iter().map(|t| OverdueTicketView::from_ticket(t, now)).collect())
    }
}
