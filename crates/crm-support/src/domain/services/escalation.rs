//! Escalation rule evaluation
//!
//! Matches active rules against one ticket snapshot. Every matching rule is
//! returned; a ticket can trip several rules in the same pass.
//!
//! Timer contract: a rule that has already escalated a ticket stays quiet
//! until `escalate_after` has elapsed since its own last escalation entry.
//! For `no_update` this falls out of the data anyway, because an escalation
//! touches `updated_at`; the other conditions follow the same rule so a
//! stateless sweep does not fire them again on every tick.

use chrono::{DateTime, Utc};

use crate::domain::aggregates::{EscalationCondition, EscalationRule, Ticket};

/// Escalation rule evaluator
pub struct EscalationRuleEvaluator;

impl EscalationRuleEvaluator {
    /// Return every active rule that matches `ticket` at `now`, in input order.
    pub fn evaluate_rules<'a>(
        ticket: &Ticket,
        rules: &'a [EscalationRule],
        now: DateTime<Utc>,
    ) -> Vec<&'a EscalationRule> {
        rules
            .iter()
            .filter(|rule| Self::matches(ticket, rule, now))
            .collect()
    }

    pub fn matches(ticket: &Ticket, rule: &EscalationRule, now: DateTime<Utc>) -> bool {
        if !rule.is_active() {
            return false;
        }
        if rule.priority().is_some_and(|p| p != ticket.priority()) {
            return false;
        }
        if rule.status().is_some_and(|s| s != ticket.status()) {
            return false;
        }

        Self::condition_holds(ticket, rule, now) && Self::rearmed(ticket, rule, now)
    }

    fn condition_holds(ticket: &Ticket, rule: &EscalationRule, now: DateTime<Utc>) -> bool {
        match rule.condition() {
            EscalationCondition::SlaBreach => ticket.due_at().is_some_and(|due| now > due),
            EscalationCondition::NoResponse => {
                ticket.first_response_at().is_none()
                    && now - ticket.created_at() > rule.escalate_after()
            }
            EscalationCondition::NoUpdate => now - ticket.updated_at() > rule.escalate_after(),
        }
    }

    fn rearmed(ticket: &Ticket, rule: &EscalationRule, now: DateTime<Utc>) -> bool {
        match ticket.last_escalation_by(rule.id()) {
            Some(last) => now - last.escalated_at > rule.escalate_after(),
            None => true,
        }
    }
}
