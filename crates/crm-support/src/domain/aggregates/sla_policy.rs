//! SLA Policy
//!
//! Response and resolution commitments for one ticket priority. Managed by
//! administrators; the ticket engine only reads policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{EntityId, Priority};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    id: EntityId,
    name: String,
    priority: Priority,
    response_time_minutes: u32,
    resolution_time_minutes: u32,
    /// Stored for administrators; due dates are always wall-clock.
    is_business_hours_only: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SlaPolicy {
    pub fn create(
        name: impl Into<String>,
        priority: Priority,
        response_time_minutes: u32,
        resolution_time_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, SlaPolicyError> {
        let name = name.into().trim().to_string();
        Self::validate(&name, response_time_minutes, resolution_time_minutes)?;

        Ok(Self {
            id: EntityId::new(),
            name,
            priority,
            response_time_minutes,
            resolution_time_minutes,
            is_business_hours_only: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> &EntityId { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn priority(&self) -> Priority { self.priority }
    pub fn response_time_minutes(&self) -> u32 { self.response_time_minutes }
    pub fn resolution_time_minutes(&self) -> u32 { self.resolution_time_minutes }
    pub fn is_business_hours_only(&self) -> bool { self.is_business_hours_only }
    pub fn is_active(&self) -> bool { self.is_active }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn set_business_hours_only(&mut self, value: bool, now: DateTime<Utc>) {
        self.is_business_hours_only = value;
        self.updated_at = now;
    }

    pub fn set_active(&mut self, value: bool, now: DateTime<Utc>) {
        self.is_active = value;
        self.updated_at = now;
    }

    /// Apply an admin edit; all-or-nothing.
    pub fn update(
        &mut self,
        name: Option<String>,
        priority: Option<Priority>,
        response_time_minutes: Option<u32>,
        resolution_time_minutes: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(), SlaPolicyError> {
        let name = name.map(|n| n.trim().to_string()).unwrap_or_else(|| self.name.clone());
        let response = response_time_minutes.unwrap_or(self.response_time_minutes);
        let resolution = resolution_time_minutes.unwrap_or(self.resolution_time_minutes);
        Self::validate(&name, response, resolution)?;

        self.name = name;
        self.response_time_minutes = response;
        self.resolution_time_minutes = resolution;
        if let Some(priority) = priority {
            self.priority = priority;
        }
        self.updated_at = now;
        Ok(())
    }

    fn validate(name: &str, response: u32, resolution: u32) -> Result<(), SlaPolicyError> {
        if name.is_empty() {
            return Err(SlaPolicyError::EmptyName);
        }
        if response == 0 || resolution == 0 {
            return Err(SlaPolicyError::ZeroDuration);
        }
        if resolution < response {
            return Err(SlaPolicyError::ResolutionBeforeResponse);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlaPolicyError {
    EmptyName,
    ZeroDuration,
    ResolutionBeforeResponse,
}

impl std::error::Error for SlaPolicyError {}

impl std::fmt::Display for SlaPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Policy name must not be empty"),
            Self::ZeroDuration => write!(f, "Response and resolution times must be positive"),
            Self::ResolutionBeforeResponse => {
                write!(f, "Resolution time must not be shorter than response time")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_validation() {
        let now = Utc::now();
        assert!(SlaPolicy::create("Urgent", Priority::Urgent, 30, 240, now).is_ok());
        assert_eq!(
            SlaPolicy::create("", Priority::Urgent, 30, 240, now),
            Err(SlaPolicyError::EmptyName)
        );
        assert_eq!(
            SlaPolicy::create("Bad", Priority::Low, 0, 240, now),
            Err(SlaPolicyError::ZeroDuration)
        );
        assert_eq!(
            SlaPolicy::create("Bad", Priority::Low, 300, 240, now),
            Err(SlaPolicyError::ResolutionBeforeResponse)
        );
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let now = Utc::now();
        let mut policy = SlaPolicy::create("High", Priority::High, 120, 480, now).unwrap();

        assert!(policy.update(None, None, Some(600), None, now).is_err());
        assert_eq!(policy.response_time_minutes(), 120);

        policy.update(Some("High v2".into()), Some(Priority::Urgent), None, Some(720), now).unwrap();
        assert_eq!(policy.name(), "High v2");
        assert_eq!(policy.priority(), Priority::Urgent);
        assert_eq!(policy.resolution_time_minutes(), 720);
    }
}
