//! Escalation sweep
//!
//! Walks every open ticket page by page, evaluates the active rules against
//! each one and executes whatever matched. One sweep at a time per process;
//! concurrent sweeps in other processes are fenced by the ticket version.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::escalation::{EscalationError, EscalationExecutor};
use crate::application::retry::retry_transient;
use crate::config::SweepConfig;
use crate::domain::aggregates::{EscalationRule, Ticket};
use crate::domain::services::EscalationRuleEvaluator;
use crate::ports::outbound::{Clock, EscalationRuleRepository, RepositoryError, SweepCursor, TicketRepository};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Every open ticket was visited
    Completed,
    Cancelled,
    DeadlineExceeded,
    /// A page of open tickets could not be loaded
    Aborted,
}

/// Summary of one sweep
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub tickets_scanned: u64,
    pub rules_matched: u64,
    pub escalations: u64,
    pub failures: u64,
    pub conflicts: u64,
    pub outcome: SweepOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            tickets_scanned: 0,
            rules_matched: 0,
            escalations: 0,
            failures: 0,
            conflicts: 0,
            outcome: SweepOutcome::Completed,
            started_at,
            finished_at: started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    #[error("an escalation sweep is already running")]
    AlreadyRunning,

    #[error("sweep aborted: {0}")]
    Repository(#[from] RepositoryError),

    /// Ticket paging failed part way; `partial` holds what was done before
    #[error("sweep aborted after {} tickets: {error}", .partial.tickets_scanned)]
    Aborted { error: RepositoryError, partial: Box<SweepReport> },
}

/// Clears the single-flight flag however the sweep ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Escalation sweep service
pub struct EscalationSweep {
    tickets: Arc<dyn TicketRepository>,
    rules: Arc<dyn EscalationRuleRepository>,
    executor: EscalationExecutor,
    clock: Arc<dyn Clock>,
    config: SweepConfig,
    running: AtomicBool,
}

impl EscalationSweep {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        rules: Arc<dyn EscalationRuleRepository>,
        executor: EscalationExecutor,
        clock: Arc<dyn Clock>,
        config: SweepConfig,
    ) -> Self {
        Self {
            tickets,
            rules,
            executor,
            clock,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one sweep over all open tickets.
    ///
    /// Stops early when `cancel` fires or the configured deadline passes;
    /// the report says which. A failure on one ticket is counted and the
    /// sweep moves on; only failing to load rules or a page aborts it, and a
    /// failed page still hands back the partial report.
    pub async fn process_escalations(&self, cancel: &CancellationToken) -> Result<SweepReport, SweepError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SweepError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let deadline = Instant::now() + self.config.deadline();
        let mut report = SweepReport::new(self.clock.now());

        let rules = retry_transient(&self.config.retry, cancel, "load escalation rules", || {
            self.rules.find_active()
        })
        .await?;

        if rules.is_empty() {
            debug!("No active escalation rules");
        } else if let Err(error) = self.scan(&rules, cancel, deadline, &mut report).await {
            report.outcome = SweepOutcome::Aborted;
            report.finished_at = self.clock.now();
            error!(
                error = %error,
                scanned = report.tickets_scanned,
                escalated = report.escalations,
                failures = report.failures,
                conflicts = report.conflicts,
                "Escalation sweep aborted loading open tickets"
            );
            return Err(SweepError::Aborted { error, partial: Box::new(report) });
        }

        report.finished_at = self.clock.now();
        info!(
            scanned = report.tickets_scanned,
            matched = report.rules_matched,
            escalated = report.escalations,
            failures = report.failures,
            conflicts = report.conflicts,
            outcome = ?report.outcome,
            "Escalation sweep finished"
        );
        Ok(report)
    }

    async fn scan(
        &self,
        rules: &[EscalationRule],
        cancel: &CancellationToken,
        deadline: Instant,
        report: &mut SweepReport,
    ) -> Result<(), RepositoryError> {
        let mut cursor: Option<SweepCursor> = None;

        loop {
            if let Some(outcome) = stop_reason(cancel, deadline) {
                report.outcome = outcome;
                return Ok(());
            }

            let page = retry_transient(&self.config.retry, cancel, "load open tickets", || {
                self.tickets.find_open_page(cursor.as_ref(), self.config.page_size)
            })
            .await;

            let page = match page {
                Ok(page) => page,
                Err(_) if cancel.is_cancelled() => {
                    report.outcome = SweepOutcome::Cancelled;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            for ticket in page.tickets {
                if let Some(outcome) = stop_reason(cancel, deadline) {
                    report.outcome = outcome;
                    return Ok(());
                }
                report.tickets_scanned += 1;
                self.process_ticket(ticket, rules, cancel, report).await;
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
    }

    /// Execute every matching rule in order, chaining the stored snapshot.
    async fn process_ticket(
        &self,
        ticket: Ticket,
        rules: &[EscalationRule],
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) {
        let matched = EscalationRuleEvaluator::evaluate_rules(&ticket, rules, self.clock.now());
        if matched.is_empty() {
            return;
        }
        report.rules_matched += matched.len() as u64;

        let mut current = ticket;
        for rule in matched {
            let result = retry_transient(&self.config.retry, cancel, "apply escalation", || {
                self.executor.execute_escalation(&current, rule)
            })
            .await;

            match result {
                Ok(stored) => {
                    report.escalations += 1;
                    current = stored;
                }
                Err(e @ EscalationError::Conflict { .. }) => {
                    report.conflicts += 1;
                    warn!(ticket_id = %current.id(), rule_id = %rule.id(), error = %e, "Skipping ticket");
                    return;
                }
                Err(e) => {
                    report.failures += 1;
                    error!(ticket_id = %current.id(), rule_id = %rule.id(), error = %e, "Escalation failed");
                    return;
                }
            }
        }
    }
}

fn stop_reason(cancel: &CancellationToken, deadline: Instant) -> Option<SweepOutcome> {
    if cancel.is_cancelled() {
        Some(SweepOutcome::Cancelled)
    } else if Instant::now() >= deadline {
        Some(SweepOutcome::DeadlineExceeded)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::{AddCommentCommand, CreateTicketCommand};
    use crate::application::tickets::TicketService;
    use crate::config::{RetryConfig, SupportConfig};
    use crate::domain::aggregates::{EscalationCondition, EscalationEntry, SlaPolicy, StatusChange};
    use crate::domain::value_objects::{EntityId, Priority, TicketNumber};
    use crate::infrastructure::adapters::{InMemoryAuditLog, InMemoryNotificationService, ManualClock};
    use crate::infrastructure::persistence::{
        InMemoryEscalationRuleRepository, InMemorySlaPolicyRepository, InMemoryTicketRepository,
    };
    use crate::ports::inbound::TicketUseCases;
    use crate::ports::outbound::{
        RepoResult, SlaPolicyRepository, SortOrder, TicketFilter, TicketListing, TicketPage, TicketSortField,
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Notify;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()
    }

    fn fast_config(page_size: usize) -> SweepConfig {
        SweepConfig {
            page_size,
            retry: RetryConfig { max_attempts: 3, base_delay_ms: 1, max_delay_ms: 2 },
            ..SweepConfig::default()
        }
    }

    struct Harness {
        tickets: Arc<InMemoryTicketRepository>,
        rules: Arc<InMemoryEscalationRuleRepository>,
        notifications: Arc<InMemoryNotificationService>,
        clock: Arc<ManualClock>,
        service: TicketService,
    }

    impl Harness {
        async fn new() -> Self {
            let tickets = Arc::new(InMemoryTicketRepository::new());
            let policies = Arc::new(InMemorySlaPolicyRepository::new());
            let rules = Arc::new(InMemoryEscalationRuleRepository::new());
            let clock = Arc::new(ManualClock::new(t0()));
            policies
                .save(&SlaPolicy::create("High", Priority::High, 120, 480, t0()).unwrap())
                .await
                .unwrap();

            let service = TicketService::new(
                tickets.clone(),
                policies,
                Arc::new(InMemoryAuditLog::new()),
                clock.clone(),
                &SupportConfig::default(),
            );

            Self {
                tickets,
                rules,
                notifications: Arc::new(InMemoryNotificationService::new()),
                clock,
                service,
            }
        }

        fn sweep_over(
            &self,
            tickets: Arc<dyn TicketRepository>,
            rules: Arc<dyn EscalationRuleRepository>,
            config: SweepConfig,
        ) -> EscalationSweep {
            let executor = EscalationExecutor::new(
                tickets.clone(),
                self.notifications.clone(),
                Arc::new(InMemoryAuditLog::new()),
                self.clock.clone(),
            );
            EscalationSweep::new(tickets, rules, executor, self.clock.clone(), config)
        }

        fn sweep(&self) -> EscalationSweep {
            self.sweep_over(self.tickets.clone(), self.rules.clone(), fast_config(200))
        }

        async fn open_ticket(&self, priority: &str) -> Ticket {
            self.service
                .create_ticket(CreateTicketCommand {
                    subject: "Cannot log in".into(),
                    description: String::new(),
                    channel: "portal".into(),
                    priority: priority.into(),
                    created_by: Some("customer-1".into()),
                })
                .await
                .unwrap()
        }

        async fn rule(&self, name: &str, condition: EscalationCondition, after: u32, to: &str) -> EscalationRule {
            let rule = EscalationRule::new(name, condition, after, EntityId::from_string(to), t0());
            self.rules.save(&rule).await.unwrap();
            rule
        }

        async fn reload(&self, ticket: &Ticket) -> Ticket {
            self.tickets.find_by_id(ticket.id()).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_two_sweeps_escalate_once() {
        let h = Harness::new().await;
        let ticket = h.open_ticket("high").await;
        h.rule("No reply in an hour", EscalationCondition::NoResponse, 60, "U1").await;
        let sweep = h.sweep();
        let cancel = CancellationToken::new();

        h.clock.set(t0() + Duration::minutes(61));
        let first = sweep.process_escalations(&cancel).await.unwrap();
        assert_eq!(first.outcome, SweepOutcome::Completed);
        assert_eq!(first.tickets_scanned, 1);
        assert_eq!(first.escalations, 1);

        let escalated = h.reload(&ticket).await;
        assert_eq!(escalated.escalation_level(), 1);
        assert_eq!(escalated.escalated_to().map(EntityId::as_str), Some("U1"));
        assert_eq!(escalated.escalation_history().len(), 1);

        h.clock.set(t0() + Duration::minutes(62));
        let second = sweep.process_escalations(&cancel).await.unwrap();
        assert_eq!(second.escalations, 0);
        assert_eq!(h.reload(&ticket).await.escalation_level(), 1);
        assert_eq!(h.notifications.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_response_stops_no_response_rule() {
        let h = Harness::new().await;
        let ticket = h.open_ticket("high").await;
        h.rule("No reply", EscalationCondition::NoResponse, 60, "U1").await;

        h.clock.set(t0() + Duration::minutes(30));
        h.service
            .add_comment(AddCommentCommand {
                ticket_id: ticket.id().to_string(),
                author_id: "agent-1".into(),
                body: "Reset your password".into(),
                is_internal: false,
            })
            .await
            .unwrap();

        h.clock.set(t0() + Duration::minutes(61));
        let report = h.sweep().process_escalations(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.rules_matched, 0);
        assert_eq!(h.reload(&ticket).await.escalation_level(), 0);
    }

    #[tokio::test]
    async fn test_every_matching_rule_fires() {
        let h = Harness::new().await;
        let ticket = h.open_ticket("high").await;
        h.rule("No reply", EscalationCondition::NoResponse, 60, "U1").await;
        h.rule("Idle", EscalationCondition::NoUpdate, 30, "U2").await;

        h.clock.set(t0() + Duration::minutes(61));
        let report = h.sweep().process_escalations(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.rules_matched, 2);
        assert_eq!(report.escalations, 2);
        let stored = h.reload(&ticket).await;
        assert_eq!(stored.escalation_level(), 2);
        let levels: Vec<u32> = stored.escalation_history().iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_paging_visits_every_open_ticket() {
        let h = Harness::new().await;
        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(h.open_ticket("medium").await);
            h.clock.advance(Duration::seconds(1));
        }
        h.rule("Idle", EscalationCondition::NoUpdate, 10, "U1").await;

        h.clock.set(t0() + Duration::minutes(30));
        let sweep = h.sweep_over(h.tickets.clone(), h.rules.clone(), fast_config(2));
        let report = sweep.process_escalations(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.tickets_scanned, 5);
        assert_eq!(report.escalations, 5);
        for ticket in &created {
            assert_eq!(h.reload(ticket).await.escalation_level(), 1);
        }
    }

    #[tokio::test]
    async fn test_closed_tickets_are_skipped() {
        let h = Harness::new().await;
        let ticket = h.open_ticket("high").await;
        let change = StatusChange {
            status: crate::domain::value_objects::TicketStatus::Closed,
            changed_by: EntityId::from_string("agent-1"),
            changed_at: t0(),
            comment: None,
        };
        h.tickets.update_status(ticket.id(), &change, 0).await.unwrap();
        h.rule("Idle", EscalationCondition::NoUpdate, 1, "U1").await;

        h.clock.set(t0() + Duration::hours(10));
        let report = h.sweep().process_escalations(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.tickets_scanned, 0);
    }

    #[tokio::test]
    async fn test_zero_deadline_stops_before_scanning() {
        let h = Harness::new().await;
        h.open_ticket("high").await;
        h.rule("Idle", EscalationCondition::NoUpdate, 1, "U1").await;
        h.clock.set(t0() + Duration::minutes(5));

        let config = SweepConfig { deadline_secs: 0, ..fast_config(10) };
        let sweep = h.sweep_over(h.tickets.clone(), h.rules.clone(), config);
        let report = sweep.process_escalations(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.outcome, SweepOutcome::DeadlineExceeded);
        assert_eq!(report.tickets_scanned, 0);
    }

    #[tokio::test]
    async fn test_cancelled_sweep_reports_cancelled() {
        let h = Harness::new().await;
        let ticket = h.open_ticket("high").await;
        h.rule("Idle", EscalationCondition::NoUpdate, 1, "U1").await;
        h.clock.set(t0() + Duration::minutes(5));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = h.sweep().process_escalations(&cancel).await.unwrap();

        assert_eq!(report.outcome, SweepOutcome::Cancelled);
        assert_eq!(h.reload(&ticket).await.escalation_level(), 0);
    }

    #[tokio::test]
    async fn test_no_rules_is_a_quiet_sweep() {
        let h = Harness::new().await;
        h.open_ticket("high").await;
        let report = h.sweep().process_escalations(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.outcome, SweepOutcome::Completed);
        assert_eq!(report.tickets_scanned, 0);
    }

    /// Rule repository that parks `find_active` until released
    struct GatedRules {
        inner: InMemoryEscalationRuleRepository,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl EscalationRuleRepository for GatedRules {
        async fn find_active(&self) -> RepoResult<Vec<EscalationRule>> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.find_active().await
        }
        async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<EscalationRule>> {
            self.inner.find_by_id(id).await
        }
        async fn list(&self) -> RepoResult<Vec<EscalationRule>> {
            self.inner.list().await
        }
        async fn save(&self, rule: &EscalationRule) -> RepoResult<()> {
            self.inner.save(rule).await
        }
        async fn delete(&self, id: &EntityId) -> RepoResult<()> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_second_concurrent_sweep_is_refused() {
        let h = Harness::new().await;
        let gate = Arc::new(GatedRules {
            inner: InMemoryEscalationRuleRepository::new(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let sweep = h.sweep_over(h.tickets.clone(), gate.clone(), fast_config(10));
        let cancel = CancellationToken::new();

        let (first, second) = tokio::join!(sweep.process_escalations(&cancel), async {
            gate.entered.notified().await;
            let result = sweep.process_escalations(&cancel).await;
            gate.release.notify_one();
            result
        });

        assert!(first.is_ok());
        assert_eq!(second, Err(SweepError::AlreadyRunning));
        assert!(!sweep.is_running());

        // the flag is released once the first sweep finishes
        gate.release.notify_one();
        assert!(sweep.process_escalations(&cancel).await.is_ok());
    }

    /// Rule repository that drops the connection a fixed number of times
    struct FlakyRules {
        inner: InMemoryEscalationRuleRepository,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl EscalationRuleRepository for FlakyRules {
        async fn find_active(&self) -> RepoResult<Vec<EscalationRule>> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(RepositoryError::ConnectionError("connection reset".into()));
            }
            self.inner.find_active().await
        }
        async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<EscalationRule>> {
            self.inner.find_by_id(id).await
        }
        async fn list(&self) -> RepoResult<Vec<EscalationRule>> {
            self.inner.list().await
        }
        async fn save(&self, rule: &EscalationRule) -> RepoResult<()> {
            self.inner.save(rule).await
        }
        async fn delete(&self, id: &EntityId) -> RepoResult<()> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_transient_rule_load_is_retried() {
        let h = Harness::new().await;
        let ticket = h.open_ticket("high").await;
        let flaky = Arc::new(FlakyRules {
            inner: InMemoryEscalationRuleRepository::new(),
            failures_left: AtomicU32::new(2),
        });
        flaky
            .save(&EscalationRule::new("Idle", EscalationCondition::NoUpdate, 1, EntityId::from_string("U1"), t0()))
            .await
            .unwrap();
        h.clock.set(t0() + Duration::minutes(5));

        let sweep = h.sweep_over(h.tickets.clone(), flaky.clone(), fast_config(10));
        let report = sweep.process_escalations(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.escalations, 1);
        assert_eq!(h.reload(&ticket).await.escalation_level(), 1);

        flaky.failures_left.store(10, Ordering::SeqCst);
        let err = sweep.process_escalations(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SweepError::Repository(RepositoryError::ConnectionError(_))));
    }

    /// Ticket repository whose escalation writes fail with a scripted error,
    /// and whose page loads can be made to fail or stall from a given page on
    struct ScriptedTickets {
        inner: InMemoryTicketRepository,
        escalation_errors: Mutex<Vec<RepositoryError>>,
        pages_served: AtomicU32,
        failing_from_page: Option<u32>,
        slow_from_page: Option<u32>,
    }

    #[async_trait]
    impl TicketRepository for ScriptedTickets {
        async fn find_all(
            &self,
            filter: &TicketFilter,
            page: u32,
            limit: u32,
            sort_by: TicketSortField,
            sort_order: SortOrder,
        ) -> RepoResult<TicketListing> {
            self.inner.find_all(filter, page, limit, sort_by, sort_order).await
        }
        async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<Ticket>> {
            self.inner.find_by_id(id).await
        }
        async fn insert(&self, ticket: &Ticket) -> RepoResult<()> {
            self.inner.insert(ticket).await
        }
        async fn update(&self, ticket: &Ticket, expected_version: u64) -> RepoResult<Ticket> {
            self.inner.update(ticket, expected_version).await
        }
        async fn update_status(&self, id: &EntityId, change: &StatusChange, expected_version: u64) -> RepoResult<Ticket> {
            self.inner.update_status(id, change, expected_version).await
        }
        async fn apply_escalation(
            &self,
            id: &EntityId,
            expected_version: u64,
            entry: &EscalationEntry,
        ) -> RepoResult<Ticket> {
            let scripted = self.escalation_errors.lock().pop();
            match scripted {
                Some(err) => Err(err),
                None => self.inner.apply_escalation(id, expected_version, entry).await,
            }
        }
        async fn find_overdue_sla(&self, now: DateTime<Utc>) -> RepoResult<Vec<Ticket>> {
            self.inner.find_overdue_sla(now).await
        }
        async fn find_open_page(&self, after: Option<&SweepCursor>, limit: usize) -> RepoResult<TicketPage> {
            let page = self.pages_served.fetch_add(1, Ordering::SeqCst);
            if self.failing_from_page.is_some_and(|from| page >= from) {
                return Err(RepositoryError::QueryError("cursor expired".into()));
            }
            if self.slow_from_page.is_some_and(|from| page >= from) {
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
            self.inner.find_open_page(after, limit).await
        }
        async fn next_ticket_number(&self) -> RepoResult<TicketNumber> {
            self.inner.next_ticket_number().await
        }
        async fn delete(&self, id: &EntityId) -> RepoResult<()> {
            self.inner.delete(id).await
        }
    }

    async fn scripted_with_two_tickets(errors: Vec<RepositoryError>) -> Arc<ScriptedTickets> {
        Arc::new(scripted_tickets(2, errors, None, None).await)
    }

    async fn scripted_tickets(
        count: i64,
        errors: Vec<RepositoryError>,
        failing_from_page: Option<u32>,
        slow_from_page: Option<u32>,
    ) -> ScriptedTickets {
        let scripted = ScriptedTickets {
            inner: InMemoryTicketRepository::new(),
            escalation_errors: Mutex::new(errors),
            pages_served: AtomicU32::new(0),
            failing_from_page,
            slow_from_page,
        };
        for offset in 0..count {
            let number = scripted.next_ticket_number().await.unwrap();
            let ticket = Ticket::create(
                number,
                crate::domain::aggregates::NewTicket {
                    subject: format!("ticket {}", number),
                    description: String::new(),
                    channel: crate::domain::value_objects::Channel::Email,
                    priority: Priority::Medium,
                    created_by: EntityId::from_string("system"),
                },
                t0() + Duration::seconds(offset),
            )
            .unwrap();
            scripted.insert(&ticket).await.unwrap();
        }
        scripted
    }

    #[tokio::test]
    async fn test_conflict_is_counted_and_sweep_continues() {
        let h = Harness::new().await;
        h.rule("Idle", EscalationCondition::NoUpdate, 1, "U1").await;
        let scripted = scripted_with_two_tickets(vec![RepositoryError::Conflict {
            id: "someone-else".into(),
            expected: 0,
            found: 1,
        }])
        .await;
        h.clock.set(t0() + Duration::minutes(5));

        let sweep = h.sweep_over(scripted.clone(), h.rules.clone(), fast_config(10));
        let report = sweep.process_escalations(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.tickets_scanned, 2);
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.escalations, 1);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test]
    async fn test_transient_write_is_retried_and_permanent_counted() {
        let h = Harness::new().await;
        h.rule("Idle", EscalationCondition::NoUpdate, 1, "U1").await;
        // popped from the back: the first write drops the connection and its
        // retry hits a query error; the second ticket goes through
        let scripted = scripted_with_two_tickets(vec![
            RepositoryError::QueryError("index missing".into()),
            RepositoryError::ConnectionError("reset".into()),
        ])
        .await;
        h.clock.set(t0() + Duration::minutes(5));

        let sweep = h.sweep_over(scripted.clone(), h.rules.clone(), fast_config(10));
        let report = sweep.process_escalations(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.escalations, 1);
        assert_eq!(report.failures, 1);
        assert_eq!(report.outcome, SweepOutcome::Completed);
    }

    #[tokio::test]
    async fn test_failed_page_returns_partial_report() {
        let h = Harness::new().await;
        h.rule("Idle", EscalationCondition::NoUpdate, 1, "U1").await;
        let scripted = Arc::new(scripted_tickets(4, Vec::new(), Some(1), None).await);
        h.clock.set(t0() + Duration::minutes(5));

        let sweep = h.sweep_over(scripted.clone(), h.rules.clone(), fast_config(2));
        let err = sweep.process_escalations(&CancellationToken::new()).await.unwrap_err();

        match err {
            SweepError::Aborted { error, partial } => {
                assert!(matches!(error, RepositoryError::QueryError(_)));
                assert_eq!(partial.outcome, SweepOutcome::Aborted);
                assert_eq!(partial.tickets_scanned, 2);
                assert_eq!(partial.escalations, 2);
                assert_eq!(partial.finished_at, t0() + Duration::minutes(5));
            }
            other => panic!("expected an aborted sweep, got {:?}", other),
        }
        // escalations written before the failure stand
        assert_eq!(h.notifications.sent().len(), 2);
        assert!(!sweep.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_passing_mid_scan_stops_paging() {
        let h = Harness::new().await;
        h.rule("Idle", EscalationCondition::NoUpdate, 1, "U1").await;
        // the second page load takes longer than the whole sweep may run
        let scripted = Arc::new(scripted_tickets(4, Vec::new(), None, Some(1)).await);
        h.clock.set(t0() + Duration::minutes(5));

        let config = SweepConfig { deadline_secs: 1, ..fast_config(2) };
        let sweep = h.sweep_over(scripted.clone(), h.rules.clone(), config);
        let report = sweep.process_escalations(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.outcome, SweepOutcome::DeadlineExceeded);
        assert_eq!(report.tickets_scanned, 2);
        assert_eq!(report.escalations, 2);
        assert_eq!(scripted.pages_served.load(Ordering::SeqCst), 2);
    }
}
