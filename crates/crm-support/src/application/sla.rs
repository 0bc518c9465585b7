//! SLA policy resolution and administration

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::application::dto::{CreateSlaPolicyCommand, UpdateSlaPolicyCommand};
use crate::domain::aggregates::SlaPolicy;
use crate::domain::value_objects::{EntityId, Priority};
use crate::ports::inbound::{SlaPolicyUseCases, UseCaseError};
use crate::ports::outbound::{Clock, SlaPolicyRepository};

/// Picks the policy that governs a new ticket
#[derive(Clone)]
pub struct SlaPolicyResolver {
    policies: Arc<dyn SlaPolicyRepository>,
}

impl SlaPolicyResolver {
    pub fn new(policies: Arc<dyn SlaPolicyRepository>) -> Self {
        Self { policies }
    }

    /// First active policy for `priority`. A missing policy, or a failed
    /// lookup, leaves the ticket without deadlines.
    pub async fn resolve(&self, priority: Priority) -> Option<SlaPolicy> {
        match self.policies.find_by_priority(priority).await {
            Ok(Some(policy)) => Some(policy),
            Ok(None) => {
                debug!(%priority, "No active SLA policy");
                None
            }
            Err(e) => {
                warn!(%priority, error = %e, "SLA policy lookup failed");
                None
            }
        }
    }
}

/// SLA policy application service
pub struct SlaPolicyService {
    policies: Arc<dyn SlaPolicyRepository>,
    clock: Arc<dyn Clock>,
}

impl SlaPolicyService {
    pub fn new(policies: Arc<dyn SlaPolicyRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { policies, clock }
    }

    async fn load(&self, policy_id: &str) -> Result<SlaPolicy, UseCaseError> {
        let id = EntityId::parse(policy_id)?;
        self.policies
            .find_by_id(&id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("sla policy {}", policy_id)))
    }
}

#[async_trait]
impl SlaPolicyUseCases for SlaPolicyService {
    async fn create_policy(&self, command: CreateSlaPolicyCommand) -> Result<SlaPolicy, UseCaseError> {
        let priority: Priority = command.priority.parse()?;
        let now = self.clock.now();

        let mut policy = SlaPolicy::create(
            command.name,
            priority,
            command.response_time_minutes,
            command.resolution_time_minutes,
            now,
        )
        .map_err(|e| UseCaseError::ValidationError(e.to_string()))?;

        policy.set_business_hours_only(command.is_business_hours_only, now);
        if let Some(active) = command.is_active {
            policy.set_active(active, now);
        }

        self.policies.save(&policy).await?;
        info!(policy_id = %policy.id(), %priority, "SLA policy created");
        Ok(policy)
    }

    async fn get_policy(&self, policy_id: &str) -> Result<SlaPolicy, UseCaseError> {
        self.load(policy_id).await
    }

    async fn list_policies(&self) -> Result<Vec<SlaPolicy>, UseCaseError> {
        Ok(self.policies.list().await?)
    }

    async fn update_policy(&self, command: UpdateSlaPolicyCommand) -> Result<SlaPolicy, UseCaseError> {
        let mut policy = self.load(&command.policy_id).await?;
        let priority = command.priority.as_deref().map(str::parse::<Priority>).transpose()?;
        let now = self.clock.now();

        policy
            .update(
                command.name,
                priority,
                command.response_time_minutes,
                command.resolution_time_minutes,
                now,
            )
            .map_err(|e| UseCaseError::ValidationError(e.to_string()))?;

        if let Some(value) = command.is_business_hours_only {
            policy.set_business_hours_only(value, now);
        }
        if let Some(active) = command.is_active {
            policy.set_active(active, now);
        }

        self.policies.save(&policy).await?;
        info!(policy_id = %policy.id(), "SLA policy updated");
        Ok(policy)
    }

    async fn delete_policy(&self, policy_id: &str) -> Result<(), UseCaseError> {
        let id = EntityId::parse(policy_id)?;
        self.policies.delete(&id).await?;
        info!(policy_id = %id, "SLA policy deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::ManualClock;
    use crate::infrastructure::persistence::InMemorySlaPolicyRepository;
    use crate::ports::outbound::{RepoResult, RepositoryError};
    use chrono::{TimeZone, Utc};

    fn service() -> (SlaPolicyService, Arc<InMemorySlaPolicyRepository>) {
        let repo = Arc::new(InMemorySlaPolicyRepository::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap()));
        (SlaPolicyService::new(repo.clone(), clock), repo)
    }

    fn urgent() -> CreateSlaPolicyCommand {
        CreateSlaPolicyCommand {
            name: "Urgent".into(),
            priority: "urgent".into(),
            response_time_minutes: 30,
            resolution_time_minutes: 240,
            is_business_hours_only: false,
            is_active: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_resolve() {
        let (service, repo) = service();
        let created = service.create_policy(urgent()).await.unwrap();
        assert!(created.is_active());

        let resolver = SlaPolicyResolver::new(repo);
        let resolved = resolver.resolve(Priority::Urgent).await.unwrap();
        assert_eq!(resolved.id(), created.id());
        assert!(resolver.resolve(Priority::Low).await.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (service, _) = service();

        let bad_priority = CreateSlaPolicyCommand { priority: "critical".into(), ..urgent() };
        assert!(matches!(service.create_policy(bad_priority).await, Err(UseCaseError::ValidationError(_))));

        let inverted = CreateSlaPolicyCommand { resolution_time_minutes: 10, ..urgent() };
        assert!(matches!(service.create_policy(inverted).await, Err(UseCaseError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_inactive_policy_is_not_resolved() {
        let (service, repo) = service();
        let created = service.create_policy(urgent()).await.unwrap();

        service
            .update_policy(UpdateSlaPolicyCommand {
                policy_id: created.id().to_string(),
                is_active: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(SlaPolicyResolver::new(repo).resolve(Priority::Urgent).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_by_bad_id() {
        let (service, _) = service();
        assert!(matches!(service.get_policy("nope").await, Err(UseCaseError::InvalidIdentifier(_))));
        assert!(matches!(
            service.get_policy(&EntityId::new().to_string()).await,
            Err(UseCaseError::NotFound(_))
        ));
    }

    struct BrokenPolicies;

    #[async_trait]
    impl SlaPolicyRepository for BrokenPolicies {
        async fn find_by_priority(&self, _: Priority) -> RepoResult<Option<SlaPolicy>> {
            Err(RepositoryError::ConnectionError("refused".into()))
        }
        async fn find_by_id(&self, _: &EntityId) -> RepoResult<Option<SlaPolicy>> {
            Ok(None)
        }
        async fn list(&self) -> RepoResult<Vec<SlaPolicy>> {
            Ok(vec![])
        }
        async fn save(&self, _: &SlaPolicy) -> RepoResult<()> {
            Ok(())
        }
        async fn delete(&self, _: &EntityId) -> RepoResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_is_soft() {
        let resolver = SlaPolicyResolver::new(Arc::new(BrokenPolicies));
        assert!(resolver.resolve(Priority::High).await.is_none());
    }
}
