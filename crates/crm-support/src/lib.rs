//! OpenSASE CRM Support Engine
//!
//! Ticket lifecycle, SLA tracking and rule-driven escalation for the CRM
//! support desk, following the same Domain-Driven Design layout as the rest
//! of the OpenSASE CRM.
//!
//! ## Architecture
//!
//! - **Domain Layer**: Ticket, SLA policy and escalation rule aggregates;
//!   deadline and rule evaluation services
//! - **Application Layer**: Use case orchestration, escalation sweep, DTOs
//! - **Ports Layer**: Hexagonal architecture interfaces
//! - **Infrastructure Layer**: In-memory repositories, clocks, tracing adapters
//!
//! ## Escalation
//!
//! [`EscalationSweep`] pages through open tickets, evaluates the active
//! [`EscalationRule`]s against each one and applies every match with a single
//! versioned write. [`scheduler::EscalationScheduler`] runs it on an interval.
//! [`engine::SupportEngine`] wires everything over the in-memory stores.

pub mod config;
pub mod domain;
pub mod application;
pub mod ports;
pub mod infrastructure;
pub mod scheduler;
pub mod engine;

// Re-exports for convenience
pub use config::{ConfigError, RetryConfig, SeedConfig, SupportConfig, SweepConfig};
pub use domain::aggregates::{EscalationCondition, EscalationRule, SlaPolicy, Ticket};
pub use domain::value_objects::{Channel, EntityId, Priority, TicketNumber, TicketStatus};
pub use domain::events::{DomainEvent, TicketEvent};
pub use application::{
    EscalationExecutor, EscalationRuleService, EscalationSweep, SlaPolicyService, SweepError, SweepOutcome,
    SweepReport, TicketService,
};
pub use ports::inbound::{EscalationRuleUseCases, SlaPolicyUseCases, TicketUseCases, UseCaseError};
pub use ports::outbound::{EscalationRuleRepository, RepositoryError, SlaPolicyRepository, TicketRepository};
pub use scheduler::EscalationScheduler;
pub use engine::{SeedSummary, SupportEngine};
