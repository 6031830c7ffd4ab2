//! Participant entity - a customer or support agent taking part in conversations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::Snowflake;

/// Role a participant authenticates as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Customer,
    #[serde(alias = "admin")]
    Agent,
}

impl ParticipantRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
        }
    }

    #[inline]
    pub const fn is_agent(self) -> bool {
        matches!(self, Self::Agent)
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            // The storefront admin panel calls its support staff "admins"
            "agent" | "admin" => Ok(Self::Agent),
            _ => Err(format!("Invalid participant role: {s}")),
        }
    }
}

/// Participant entity
///
/// Created on first successful authentication and never deleted; only the online flag and
/// last-seen timestamp change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Snowflake,
    pub role: ParticipantRole,
    pub online: bool,
    pub last_seen_at: DateTime<Utc>,
}

impl Participant {
    /// A participant that has just connected
    pub fn online(id: Snowflake, role: ParticipantRole) -> Self {
        Self {
            id,
            role,
            online: true,
            last_seen_at: Utc::now(),
        }
    }

    pub fn go_offline(&mut self) {
        self.online = false;
        self.last_seen_at = Utc::now();
    }

    pub fn go_online(&mut self) {
        self.online = true;
        self.last_seen_at = Utc::now();
    }
}
