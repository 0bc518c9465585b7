//! SLA domain services
//!
//! Deadline derivation and breach detection. Both are pure functions of the
//! ticket, the policy and the supplied `now`.

use chrono::{DateTime, Duration, Utc};

use crate::domain::aggregates::{SlaPolicy, Ticket};

/// Deadlines derived from a policy at ticket creation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueDates {
    pub response_due_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// Due date calculator
pub struct DueDateCalculator;

impl DueDateCalculator {
    /// Wall-clock deadlines: `now + response_time`, `now + resolution_time`.
    /// The policy's business-hours flag is not applied.
    pub fn calculate_due_dates(policy: &SlaPolicy, now: DateTime<Utc>) -> DueDates {
        DueDates {
            response_due_at: now + Duration::minutes(i64::from(policy.response_time_minutes())),
            due_at: now + Duration::minutes(i64::from(policy.resolution_time_minutes())),
        }
    }
}

/// Which deadline(s) a ticket has missed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreachKind {
    Response,
    Resolution,
    Both,
}

/// SLA breach detector
pub struct BreachDetector;

impl BreachDetector {
    /// Response deadline passed without a first public reply.
    pub fn is_response_breached(ticket: &Ticket, now: DateTime<Utc>) -> bool {
        match ticket.response_due_at() {
            Some(due) => ticket.first_response_at().is_none() && now > due,
            None => false,
        }
    }

    /// Resolution deadline passed while the ticket is still open.
    pub fn is_resolution_breached(ticket: &Ticket, now: DateTime<Utc>) -> bool {
        match ticket.due_at() {
            Some(due) => ticket.is_open() && now > due,
            None => false,
        }
    }

    pub fn check_sla_breach(ticket: &Ticket, now: DateTime<Utc>) -> bool {
        Self::breach_kind(ticket, now).is_some()
    }

    pub fn breach_kind(ticket: &Ticket, now: DateTime<Utc>) -> Option<BreachKind> {
        match (
            Self::is_response_breached(ticket, now),
            Self::is_resolution_breached(ticket, now),
        ) {
            (true, true) => Some(BreachKind::Both),
            (true, false) => Some(BreachKind::Response),
            (false, true) => Some(BreachKind::Resolution),
            (false, false) => None,
        }
    }
}
