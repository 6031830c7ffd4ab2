//! Message entity - represents a chat message inside a support conversation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::participant::ParticipantRole;
use crate::value_objects::Snowflake;

/// Maximum message length in characters
pub const MAX_CONTENT_LENGTH: usize = 2000;

/// Kind of payload a message carries
///
/// Image and file messages carry a URL produced by the upload service; this layer never
/// inspects the referenced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    System,
}

impl MessageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            "system" => Ok(Self::System),
            _ => Err(format!("Invalid message type: {s}")),
        }
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Customer,
    Agent,
    System,
}

impl SenderType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

impl From<ParticipantRole> for SenderType {
    fn from(role: ParticipantRole) -> Self {
        match role {
            ParticipantRole::Customer => Self::Customer,
            ParticipantRole::Agent => Self::Agent,
        }
    }
}

impl std::str::FromStr for SenderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "agent" => Ok(Self::Agent),
            "system" => Ok(Self::System),
            _ => Err(format!("Invalid sender type: {s}")),
        }
    }
}

/// Message entity
///
/// Immutable once created except for the read receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub sender_id: Snowflake,
    pub sender_type: SenderType,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        id: Snowflake,
        conversation_id: Snowflake,
        sender_id: Snowflake,
        sender_type: SenderType,
        content: String,
        message_type: MessageType,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender_id,
            sender_type,
            content,
            message_type,
            created_at: Utc::now(),
            read: false,
            read_at: None,
        }
    }

    /// Mark as read by the counterpart; returns false if it already was
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(at);
        true
    }

    /// Whether `reader` is the party whose read receipt this message waits on
    #[inline]
    pub fn is_unread_for(&self, reader: Snowflake) -> bool {
        !self.read && self.sender_id != reader
    }

    /// Get a truncated preview of the message (for conversation lists)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }
}
