//! Support Engine Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::dto::{CreateEscalationRuleCommand, CreateSlaPolicyCommand, CreateTicketCommand};

/// Environment variable overrides
pub const ENV_SYSTEM_USER_ID: &str = "CRM_SYSTEM_USER_ID";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "CRM_SWEEP_INTERVAL_SECS";
pub const ENV_SWEEP_PAGE_SIZE: &str = "CRM_SWEEP_PAGE_SIZE";
pub const ENV_SWEEP_DEADLINE_SECS: &str = "CRM_SWEEP_DEADLINE_SECS";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Actor recorded on tickets ingested from automated channels
    pub system_user_id: String,
    /// Escalation sweep settings
    pub sweep: SweepConfig,
    /// Records loaded into the in-memory stores at startup
    pub seed: SeedConfig,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            system_user_id: "system".into(),
            sweep: SweepConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

/// Startup data, created through the regular use cases in this order:
/// policies, rules, then tickets (so tickets pick up their SLA).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub policies: Vec<CreateSlaPolicyCommand>,
    pub rules: Vec<CreateEscalationRuleCommand>,
    pub tickets: Vec<CreateTicketCommand>,
}

impl SeedConfig {
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.rules.is_empty() && self.tickets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Tickets fetched per page
    pub page_size: usize,
    /// Seconds between scheduled sweeps
    pub interval_secs: u64,
    /// Wall time a single sweep may spend before it stops paging
    pub deadline_secs: u64,
    pub retry: RetryConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            interval_secs: 60,
            deadline_secs: 300,
            retry: RetryConfig::default(),
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Bounded exponential backoff for transient repository errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_ms.saturating_mul(1 << attempt.min(10));
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

impl SupportConfig {
    /// Load from a JSON file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CRM_*` environment overrides on top of the current values
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = lookup(ENV_SYSTEM_USER_ID) {
            self.system_user_id = user;
        }
        if let Some(value) = lookup(ENV_SWEEP_INTERVAL_SECS) {
            self.sweep.interval_secs = parse_number(ENV_SWEEP_INTERVAL_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_SWEEP_PAGE_SIZE) {
            self.sweep.page_size = parse_number(ENV_SWEEP_PAGE_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_SWEEP_DEADLINE_SECS) {
            self.sweep.deadline_secs = parse_number(ENV_SWEEP_DEADLINE_SECS, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system_user_id.trim().is_empty() {
            return Err(ConfigError::Invalid("system_user_id must not be empty".into()));
        }
        if self.sweep.page_size == 0 {
            return Err(ConfigError::Invalid("sweep.page_size must be > 0".into()));
        }
        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep.interval_secs must be > 0".into()));
        }
        if self.sweep.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("sweep.retry.max_attempts must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} is not a number: {}", key, value)))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
