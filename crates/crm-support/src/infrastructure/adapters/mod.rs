//! Collaborator adapters: clocks, notifications, audit trail

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::info;

use crate::domain::events::{ChangeAction, FieldChange};
use crate::domain::value_objects::EntityId;
use crate::ports::outbound::{AuditLog, Clock, CollaboratorError, Notification, NotificationService};

// =============================================================================
// Clocks
// =============================================================================

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(start) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// Delivers notifications into the log stream
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotificationService;

#[async_trait]
impl NotificationService for TracingNotificationService {
    async fn create_notification(&self, notification: Notification) -> Result<(), CollaboratorError> {
        info!(
            user_id = %notification.user_id,
            kind = ?notification.kind,
            link = %notification.link,
            "{}: {}",
            notification.title,
            notification.message
        );
        Ok(())
    }
}

/// Keeps delivered notifications in memory; can be told to fail
#[derive(Debug, Default)]
pub struct InMemoryNotificationService {
    sent: RwLock<Vec<Notification>>,
    failing: bool,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every notification
    pub fn failing() -> Self {
        Self { sent: RwLock::new(Vec::new()), failing: true }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().clone()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn create_notification(&self, notification: Notification) -> Result<(), CollaboratorError> {
        if self.failing {
            return Err(CollaboratorError {
                collaborator: "notifications",
                reason: "delivery refused".into(),
            });
        }
        self.sent.write().push(notification);
        Ok(())
    }
}

// =============================================================================
// Audit
// =============================================================================

/// Writes audit records as structured log lines
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn log_change(
        &self,
        action: ChangeAction,
        module: &str,
        record_id: &EntityId,
        changes: Vec<FieldChange>,
    ) -> Result<(), CollaboratorError> {
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        info!(
            target: "audit",
            action = action.as_str(),
            module,
            record_id = %record_id,
            fields = ?fields,
            "record changed"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuditRecord {
    pub action: ChangeAction,
    pub module: String,
    pub record_id: EntityId,
    pub changes: Vec<FieldChange>,
}

/// Audit log kept in memory for inspection
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    pub fn actions_for(&self, record_id: &EntityId) -> Vec<ChangeAction> {
        self.records
            .read()
            .iter()
            .filter(|r| &r.record_id == record_id)
            .map(|r| r.action)
            .collect()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn log_change(
        &self,
        action: ChangeAction,
        module: &str,
        record_id: &EntityId,
        changes: Vec<FieldChange>,
    ) -> Result<(), CollaboratorError> {
        self.records.write().push(AuditRecord {
            action,
            module: module.to_string(),
            record_id: record_id.clone(),
            changes,
        });
        Ok(())
    }
}
