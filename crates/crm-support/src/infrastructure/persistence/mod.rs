//! In-memory repository implementations
//!
//! Single-document semantics: every write swaps one ticket under the map's
//! write lock, so a status write or an escalation write is atomic.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::aggregates::{EscalationEntry, EscalationRule, SlaPolicy, StatusChange, Ticket};
use crate::domain::services::BreachDetector;
use crate::domain::value_objects::{EntityId, Priority, TicketNumber};
use crate::ports::outbound::{
    EscalationRuleRepository, RepoResult, RepositoryError, SlaPolicyRepository, SortOrder,
    SweepCursor, TicketFilter, TicketListing, TicketPage, TicketRepository, TicketSortField,
};

/// In-memory ticket repository
#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: RwLock<HashMap<String, Ticket>>,
    sequence: AtomicU64,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tickets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.read().is_empty()
    }

    /// Run `mutate` on a copy of the stored ticket and commit it with the
    /// next version if `expected_version` still matches.
    fn commit<F>(&self, id: &EntityId, expected_version: u64, mutate: F) -> RepoResult<Ticket>
    where
        F: FnOnce(&mut Ticket) -> RepoResult<()>,
    {
        let mut tickets = self.tickets.write();
        let stored = tickets
            .get(id.as_str())
            .ok_or_else(|| RepositoryError::NotFound(format!("ticket {}", id)))?;

        if stored.version() != expected_version {
            return Err(RepositoryError::Conflict {
                id: id.to_string(),
                expected: expected_version,
                found: stored.version(),
            });
        }

        let mut next = stored.clone();
        mutate(&mut next)?;
        next.take_events();
        next.set_version(expected_version + 1);
        tickets.insert(id.to_string(), next.clone());
        Ok(next)
    }
}

fn compare(a: &Ticket, b: &Ticket, field: TicketSortField) -> Ordering {
    let primary = match field {
        TicketSortField::CreatedAt => a.created_at().cmp(&b.created_at()),
        TicketSortField::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
        TicketSortField::Number => a.number().cmp(&b.number()),
        TicketSortField::Priority => a.priority().cmp(&b.priority()),
        TicketSortField::DueAt => a.due_at().cmp(&b.due_at()),
    };
    primary.then_with(|| a.id().cmp(b.id()))
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn find_all(
        &self,
        filter: &TicketFilter,
        page: u32,
        limit: u32,
        sort_by: TicketSortField,
        sort_order: SortOrder,
    ) -> RepoResult<TicketListing> {
        let mut matching: Vec<Ticket> = self
            .tickets
            .read()
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();

        matching.sort_by(|a, b| compare(a, b, sort_by));
        if sort_order == SortOrder::Desc {
            matching.reverse();
        }

        let total = matching.len() as u64;
        let skip = (page.max(1) as usize - 1) * limit as usize;
        let tickets = matching.into_iter().skip(skip).take(limit as usize).collect();

        Ok(TicketListing { tickets, total })
    }

    async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<Ticket>> {
        Ok(self.tickets.read().get(id.as_str()).cloned())
    }

    async fn insert(&self, ticket: &Ticket) -> RepoResult<()> {
        let mut tickets = self.tickets.write();
        if tickets.contains_key(ticket.id().as_str()) {
            return Err(RepositoryError::QueryError(format!("duplicate ticket {}", ticket.id())));
        }
        let mut stored = ticket.clone();
        stored.take_events();
        tickets.insert(ticket.id().to_string(), stored);
        Ok(())
    }

    async fn update(&self, ticket: &Ticket, expected_version: u64) -> RepoResult<Ticket> {
        let replacement = ticket.clone();
        self.commit(ticket.id(), expected_version, move |stored| {
            *stored = replacement;
            Ok(())
        })
    }

    async fn update_status(
        &self,
        id: &EntityId,
        change: &StatusChange,
        expected_version: u64,
    ) -> RepoResult<Ticket> {
        self.commit(id, expected_version, |stored| {
            stored.apply_status_change(change);
            Ok(())
        })
    }

    async fn apply_escalation(
        &self,
        id: &EntityId,
        expected_version: u64,
        entry: &EscalationEntry,
    ) -> RepoResult<Ticket> {
        self.commit(id, expected_version, |stored| {
            stored
                .record_escalation(entry)
                .map_err(|e| RepositoryError::QueryError(e.to_string()))
        })
    }

    async fn find_overdue_sla(&self, now: DateTime<Utc>) -> RepoResult<Vec<Ticket>> {
        let mut overdue: Vec<Ticket> = self
            .tickets
            .read()
            .values()
            .filter(|t| BreachDetector::check_sla_breach(t, now))
            .cloned()
            .collect();
        overdue.sort_by(|a, b| compare(a, b, TicketSortField::DueAt));
        Ok(overdue)
    }

    async fn find_open_page(&self, after: Option<&SweepCursor>, limit: usize) -> RepoResult<TicketPage> {
        let mut open: Vec<Ticket> = self
            .tickets
            .read()
            .values()
            .filter(|t| t.is_open())
            .filter(|t| after.map_or(true, |cursor| SweepCursor::after(t) > *cursor))
            .cloned()
            .collect();

        open.sort_by(|a, b| compare(a, b, TicketSortField::CreatedAt));
        open.truncate(limit);

        let next = if limit > 0 && open.len() == limit {
            open.last().map(SweepCursor::after)
        } else {
            None
        };

        Ok(TicketPage { tickets: open, next })
    }

    async fn next_ticket_number(&self) -> RepoResult<TicketNumber> {
        let value = self.sequence.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        Ok(TicketNumber::new(value))
    }

    async fn delete(&self, id: &EntityId) -> RepoResult<()> {
        self.tickets
            .write()
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("ticket {}", id)))
    }
}

/// In-memory SLA policy repository
#[derive(Default)]
pub struct InMemorySlaPolicyRepository {
    policies: DashMap<String, SlaPolicy>,
}

impl InMemorySlaPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self) -> Vec<SlaPolicy> {
        let mut policies: Vec<SlaPolicy> = self.policies.iter().map(|p| p.value().clone()).collect();
        policies.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
        policies
    }
}

#[async_trait]
impl SlaPolicyRepository for InMemorySlaPolicyRepository {
    async fn find_by_priority(&self, priority: Priority) -> RepoResult<Option<SlaPolicy>> {
        Ok(self
            .sorted()
            .into_iter()
            .find(|p| p.is_active() && p.priority() == priority))
    }

    async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<SlaPolicy>> {
        Ok(self.policies.get(id.as_str()).map(|p| p.value().clone()))
    }

    async fn list(&self) -> RepoResult<Vec<SlaPolicy>> {
        Ok(self.sorted())
    }

    async fn save(&self, policy: &SlaPolicy) -> RepoResult<()> {
        self.policies.insert(policy.id().to_string(), policy.clone());
        Ok(())
    }

    async fn delete(&self, id: &EntityId) -> RepoResult<()> {
        self.policies
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("sla policy {}", id)))
    }
}

/// In-memory escalation rule repository
#[derive(Default)]
pub struct InMemoryEscalationRuleRepository {
    rules: DashMap<String, EscalationRule>,
}

impl InMemoryEscalationRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self) -> Vec<EscalationRule> {
        let mut rules: Vec<EscalationRule> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
        rules
    }
}

#[async_trait]
impl EscalationRuleRepository for InMemoryEscalationRuleRepository {
    async fn find_active(&self) -> RepoResult<Vec<EscalationRule>> {
        Ok(self.sorted().into_iter().filter(|r| r.is_active()).collect())
    }

    async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<EscalationRule>> {
        Ok(self.rules.get(id.as_str()).map(|r| r.value().clone()))
    }

    async fn list(&self) -> RepoResult<Vec<EscalationRule>> {
        Ok(self.sorted())
    }

    async fn save(&self, rule: &EscalationRule) -> RepoResult<()> {
        self.rules.insert(rule.id().to_string(), rule.clone());
        Ok(())
    }

    async fn delete(&self, id: &EntityId) -> RepoResult<()> {
        self.rules
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("escalation rule {}", id)))
    }
}
