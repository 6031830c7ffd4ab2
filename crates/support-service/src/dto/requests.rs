//! Request DTOs with validation

use serde::Deserialize;
use support_core::entities::MAX_CONTENT_LENGTH;
use support_core::{ConversationStatus, MessageType, ParticipantRole, Snowflake};
use validator::{Validate, ValidationError};

/// The authenticated participant performing an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Snowflake,
    pub role: ParticipantRole,
}

impl Actor {
    pub const fn new(user_id: Snowflake, role: ParticipantRole) -> Self {
        Self { user_id, role }
    }

    pub const fn customer(user_id: Snowflake) -> Self {
        Self::new(user_id, ParticipantRole::Customer)
    }

    pub const fn agent(user_id: Snowflake) -> Self {
        Self::new(user_id, ParticipantRole::Agent)
    }

    #[inline]
    pub const fn is_agent(&self) -> bool {
        self.role.is_agent()
    }
}

/// `send_message` payload
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Absent on a customer's first message: the open conversation is found or started
    #[serde(default)]
    pub conversation_id: Option<Snowflake>,

    #[validate(custom(function = "validate_content"))]
    pub content: String,

    #[serde(default)]
    pub message_type: MessageType,
}

impl SendMessageRequest {
    pub fn text(conversation_id: Option<Snowflake>, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            content: content.into(),
            message_type: MessageType::Text,
        }
    }
}

/// Content is measured in characters after trimming surrounding whitespace
fn validate_content(content: &str) -> Result<(), ValidationError> {
    let length = content.trim().chars().count();
    if length == 0 {
        return Err(ValidationError::new("length").with_message("Content must not be empty".into()));
    }
    if length > MAX_CONTENT_LENGTH {
        return Err(ValidationError::new("length").with_message(
            format!("Content must be at most {MAX_CONTENT_LENGTH} characters").into(),
        ));
    }
    Ok(())
}

/// `join_conversation` payload
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub conversation_id: Snowflake,

    /// Page cursor: only messages older than this one
    #[serde(default)]
    pub before: Option<Snowflake>,

    #[serde(default)]
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
}

impl HistoryRequest {
    pub fn latest(conversation_id: Snowflake) -> Self {
        Self {
            conversation_id,
            before: None,
            limit: None,
        }
    }
}

/// Payload naming a single conversation
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub conversation_id: Snowflake,
}

/// `assign_conversation` payload
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub conversation_id: Snowflake,
    #[serde(alias = "agentId")]
    pub admin_id: Snowflake,
}

/// `list_conversations` payload
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConversationsRequest {
    #[serde(default)]
    pub status: Option<ConversationStatus>,
}
