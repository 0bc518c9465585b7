//! In-process wiring of the support engine
//!
//! Builds the in-memory repositories, the application services on top of
//! them and the escalation sweep, all sharing one clock, notifier and audit
//! log.

use std::sync::Arc;

use tracing::info;

use crate::application::{
    EscalationExecutor, EscalationRuleService, EscalationSweep, SlaPolicyService, TicketService,
};
use crate::config::{SeedConfig, SupportConfig};
use crate::infrastructure::{InMemoryEscalationRuleRepository, InMemorySlaPolicyRepository, InMemoryTicketRepository};
use crate::ports::inbound::{EscalationRuleUseCases, SlaPolicyUseCases, TicketUseCases, UseCaseError};
use crate::ports::outbound::{AuditLog, Clock, NotificationService};
use crate::scheduler::EscalationScheduler;

/// Counts of records created by [`SupportEngine::seed`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub policies: usize,
    pub rules: usize,
    pub tickets: usize,
}

pub struct SupportEngine {
    tickets: TicketService,
    policies: SlaPolicyService,
    rules: EscalationRuleService,
    sweep: Arc<EscalationSweep>,
    config: SupportConfig,
}

impl SupportEngine {
    pub fn in_memory(
        config: SupportConfig,
        clock: Arc<dyn Clock>,
        notifications: Arc<dyn NotificationService>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        let ticket_repo = Arc::new(InMemoryTicketRepository::new());
        let policy_repo = Arc::new(InMemorySlaPolicyRepository::new());
        let rule_repo = Arc::new(InMemoryEscalationRuleRepository::new());

        let tickets = TicketService::new(
            ticket_repo.clone(),
            policy_repo.clone(),
            audit.clone(),
            clock.clone(),
            &config,
        );
        let policies = SlaPolicyService::new(policy_repo, clock.clone());
        let rules = EscalationRuleService::new(rule_repo.clone(), clock.clone());

        let executor = EscalationExecutor::new(ticket_repo.clone(), notifications, audit, clock.clone());
        let sweep = Arc::new(EscalationSweep::new(
            ticket_repo,
            rule_repo,
            executor,
            clock,
            config.sweep.clone(),
        ));

        Self { tickets, policies, rules, sweep, config }
    }

    pub fn tickets(&self) -> &TicketService {
        &self.tickets
    }

    pub fn policies(&self) -> &SlaPolicyService {
        &self.policies
    }

    pub fn rules(&self) -> &EscalationRuleService {
        &self.rules
    }

    pub fn sweep(&self) -> Arc<EscalationSweep> {
        self.sweep.clone()
    }

    pub fn scheduler(&self) -> EscalationScheduler {
        EscalationScheduler::new(self.sweep.clone(), &self.config.sweep)
    }

    /// Create the seed records through the use cases, so they are validated
    /// and audited like any other write. Stops at the first invalid record.
    pub async fn seed(&self, seed: &SeedConfig) -> Result<SeedSummary, UseCaseError> {
        let mut summary = SeedSummary::default();

        for command in &seed.policies {
            self.policies.create_policy(command.clone()).await?;
            summary.policies += 1;
        }
        for command in &seed.rules {
            self.rules.create_rule(command.clone()).await?;
            summary.rules += 1;
        }
        for command in &seed.tickets {
            self.tickets.create_ticket(command.clone()).await?;
            summary.tickets += 1;
        }

        info!(
            policies = summary.policies,
            rules = summary.rules,
            tickets = summary.tickets,
            "Seed data loaded"
        );
        Ok(summary)
    }
}
