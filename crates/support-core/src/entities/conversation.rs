//! Conversation entity - a support thread between one customer and at most one agent
//!
//! Lifecycle:
//!
//! ```text
//!   waiting ──assign──▶ active ──close──▶ closed
//!      │                  │ ▲
//!      │                  └─┘ reassign
//!      └──────────close─────────────────▶ closed
//! ```
//!
//! `closed` is terminal: every transition out of it fails with
//! [`DomainError::ConversationClosed`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::message::{Message, SenderType};
use super::participant::ParticipantRole;
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Characters kept in the denormalized last-message preview
pub const PREVIEW_LENGTH: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Created by the customer, no agent assigned yet
    Waiting,
    /// An agent is assigned
    Active,
    /// Terminal
    Closed,
}

impl ConversationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    #[inline]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Invalid conversation status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

/// Denormalized pointer to the newest message, kept for conversation lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: Snowflake,
    pub sender_id: Snowflake,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

/// Conversation entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Snowflake,
    pub customer_id: Snowflake,
    pub agent_id: Option<Snowflake>,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub last_message: Option<LastMessage>,
    pub customer_unread: u32,
    pub agent_unread: u32,
}

/// Result of an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// waiting -> active
    Activated,
    /// active -> active with a different agent
    Reassigned { previous: Snowflake },
    /// The same agent was already assigned
    Unchanged,
}

impl Conversation {
    /// Start a new waiting conversation for a customer
    pub fn start(id: Snowflake, customer_id: Snowflake) -> Self {
        let now = Utc::now();
        Self {
            id,
            customer_id,
            agent_id: None,
            status: ConversationStatus::Waiting,
            priority: Priority::default(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            last_message: None,
            customer_unread: 0,
            agent_unread: 0,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// Fail with the terminal-state error if the conversation is closed
    pub fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_closed() {
            return Err(DomainError::ConversationClosed(self.id));
        }
        Ok(())
    }

    /// Role `user_id` plays in this conversation, if any
    pub fn role_of(&self, user_id: Snowflake) -> Option<ParticipantRole> {
        if user_id == self.customer_id {
            Some(ParticipantRole::Customer)
        } else if self.agent_id == Some(user_id) {
            Some(ParticipantRole::Agent)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_member(&self, user_id: Snowflake) -> bool {
        self.role_of(user_id).is_some()
    }

    /// Fail unless `user_id` is the customer or the assigned agent
    pub fn ensure_member(&self, user_id: Snowflake) -> Result<ParticipantRole, DomainError> {
        self.role_of(user_id)
            .ok_or(DomainError::NotConversationMember {
                conversation_id: self.id,
                user_id,
            })
    }

    /// Assign (or reassign) an agent
    pub fn assign(&mut self, agent_id: Snowflake) -> Result<Assignment, DomainError> {
        self.ensure_open()?;

        let outcome = match (self.status, self.agent_id) {
            (ConversationStatus::Active, Some(current)) if current == agent_id => {
                return Ok(Assignment::Unchanged);
            }
            (ConversationStatus::Active, Some(previous)) => Assignment::Reassigned { previous },
            _ => Assignment::Activated,
        };

        self.agent_id = Some(agent_id);
        self.status = ConversationStatus::Active;
        self.updated_at = Utc::now();
        Ok(outcome)
    }

    /// Close the conversation; returns false when it was already closed
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        let now = Utc::now();
        self.status = ConversationStatus::Closed;
        self.closed_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Update the denormalized last-message pointer and the counterpart's unread count
    pub fn record_message(&mut self, message: &Message) {
        match message.sender_type {
            SenderType::Customer => self.agent_unread += 1,
            SenderType::Agent => self.customer_unread += 1,
            SenderType::System => {
                self.customer_unread += 1;
                self.agent_unread += 1;
            }
        }
        self.last_message = Some(LastMessage {
            id: message.id,
            sender_id: message.sender_id,
            preview: message.preview(PREVIEW_LENGTH).to_string(),
            created_at: message.created_at,
        });
        self.updated_at = message.created_at;
    }

    /// Unread count as seen by `user_id`
    pub fn unread_for(&self, user_id: Snowflake) -> u32 {
        match self.role_of(user_id) {
            Some(ParticipantRole::Customer) => self.customer_unread,
            Some(ParticipantRole::Agent) => self.agent_unread,
            None => 0,
        }
    }

    /// Reset the unread count of `user_id`'s side
    pub fn clear_unread(&mut self, user_id: Snowflake) {
        match self.role_of(user_id) {
            Some(ParticipantRole::Customer) => self.customer_unread = 0,
            Some(ParticipantRole::Agent) => self.agent_unread = 0,
            None => {}
        }
    }
}
