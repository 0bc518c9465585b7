//! Intake channel of a ticket
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValueError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Chat,
    #[default]
    Portal,
    Phone,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Chat => "chat",
            Self::Portal => "portal",
            Self::Phone => "phone",
        }
    }

    /// Channels whose tickets are ingested without a human actor
    pub fn is_automated(&self) -> bool {
        matches!(self, Self::Email | Self::Chat)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "chat" => Ok(Self::Chat),
            "portal" => Ok(Self::Portal),
            "phone" => Ok(Self::Phone),
            _ => Err(ValueError::InvalidChannel(s.to_string())),
        }
    }
}
