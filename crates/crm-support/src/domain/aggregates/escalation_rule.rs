//! Escalation Rule
//!
//! Admin-managed trigger evaluated by the escalation sweep. Evaluation never
//! mutates a rule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::value_objects::{EntityId, Priority, TicketStatus, ValueError};

/// Temporal predicate tested by a rule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCondition {
    /// Resolution deadline has passed
    SlaBreach,
    /// No public reply since creation for `escalate_after` minutes
    NoResponse,
    /// Ticket untouched for `escalate_after` minutes
    NoUpdate,
}

impl EscalationCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlaBreach => "sla_breach",
            Self::NoResponse => "no_response",
            Self::NoUpdate => "no_update",
        }
    }
}

impl fmt::Display for EscalationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscalationCondition {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sla_breach" => Ok(Self::SlaBreach),
            "no_response" => Ok(Self::NoResponse),
            "no_update" => Ok(Self::NoUpdate),
            _ => Err(ValueError::InvalidCondition(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    id: EntityId,
    name: String,
    priority: Option<Priority>,
    status: Option<TicketStatus>,
    condition: EscalationCondition,
    escalate_after_minutes: u32,
    escalate_to: EntityId,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EscalationRule {
    pub fn new(
        name: impl Into<String>,
        condition: EscalationCondition,
        escalate_after_minutes: u32,
        escalate_to: EntityId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            priority: None,
            status: None,
            condition,
            escalate_after_minutes,
            escalate_to,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Restrict the rule to one ticket priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Restrict the rule to one ticket status
    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn id(&self) -> &EntityId { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn priority(&self) -> Option<Priority> { self.priority }
    pub fn status(&self) -> Option<TicketStatus> { self.status }
    pub fn condition(&self) -> EscalationCondition { self.condition }
    pub fn escalate_after_minutes(&self) -> u32 { self.escalate_after_minutes }
    pub fn escalate_to(&self) -> &EntityId { &self.escalate_to }
    pub fn is_active(&self) -> bool { self.is_active }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn escalate_after(&self) -> Duration {
        Duration::minutes(i64::from(self.escalate_after_minutes))
    }

    pub fn set_active(&mut self, value: bool, now: DateTime<Utc>) {
        self.is_active = value;
        self.updated_at = now;
    }

    /// Replace the editable fields of the rule. `Some(None)` clears a filter.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        name: Option<String>,
        priority: Option<Option<Priority>>,
        status: Option<Option<TicketStatus>>,
        condition: Option<EscalationCondition>,
        escalate_after_minutes: Option<u32>,
        escalate_to: Option<EntityId>,
        now: DateTime<Utc>,
    ) {
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(priority) = priority {
            self.priority = priority;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(condition) = condition {
            self.condition = condition;
        }
        if let Some(minutes) = escalate_after_minutes {
            self.escalate_after_minutes = minutes;
        }
        if let Some(target) = escalate_to {
            self.escalate_to = target;
        }
        self.updated_at = now;
    }
}
