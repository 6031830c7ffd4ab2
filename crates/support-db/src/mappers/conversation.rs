//! Conversation entity <-> model mapper

use support_core::entities::{Conversation, LastMessage};
use support_core::value_objects::Snowflake;
use support_core::DomainError;

use super::corrupt_column;
use crate::models::ConversationModel;

/// Convert ConversationModel to Conversation entity
impl TryFrom<ConversationModel> for Conversation {
    type Error = DomainError;

    fn try_from(model: ConversationModel) -> Result<Self, Self::Error> {
        let last_message = match (
            model.last_message_id,
            model.last_message_sender_id,
            model.last_message_at,
        ) {
            (Some(id), Some(sender_id), Some(created_at)) => Some(LastMessage {
                id: Snowflake::new(id),
                sender_id: Snowflake::new(sender_id),
                preview: model.last_message_preview.unwrap_or_default(),
                created_at,
            }),
            _ => None,
        };

        Ok(Conversation {
            id: Snowflake::new(model.id),
            customer_id: Snowflake::new(model.customer_id),
            agent_id: model.agent_id.map(Snowflake::new),
            status: model
                .status
                .parse()
                .map_err(|e| corrupt_column("conversations.status", e))?,
            priority: model
                .priority
                .parse()
                .map_err(|e| corrupt_column("conversations.priority", e))?,
            created_at: model.created_at,
            updated_at: model.updated_at,
            closed_at: model.closed_at,
            last_message,
            customer_unread: model.customer_unread.max(0) as u32,
            agent_unread: model.agent_unread.max(0) as u32,
        })
    }
}

/// Column values of a Conversation entity, shared by insert and update
pub struct ConversationValues<'a> {
    pub id: i64,
    pub customer_id: i64,
    pub agent_id: Option<i64>,
    pub status: &'static str,
    pub priority: &'static str,
    pub last_message_id: Option<i64>,
    pub last_message_sender_id: Option<i64>,
    pub last_message_preview: Option<&'a str>,
    pub last_message_at: Option<chrono::DateTime<chrono::Utc>>,
    pub customer_unread: i32,
    pub agent_unread: i32,
}

impl<'a> ConversationValues<'a> {
    pub fn new(conversation: &'a Conversation) -> Self {
        let last = conversation.last_message.as_ref();
        Self {
            id: conversation.id.into_inner(),
            customer_id: conversation.customer_id.into_inner(),
            agent_id: conversation.agent_id.map(Snowflake::into_inner),
            status: conversation.status.as_str(),
            priority: conversation.priority.as_str(),
            last_message_id: last.map(|m| m.id.into_inner()),
            last_message_sender_id: last.map(|m| m.sender_id.into_inner()),
            last_message_preview: last.map(|m| m.preview.as_str()),
            last_message_at: last.map(|m| m.created_at),
            customer_unread: i32::try_from(conversation.customer_unread).unwrap_or(i32::MAX),
            agent_unread: i32::try_from(conversation.agent_unread).unwrap_or(i32::MAX),
        }
    }
}
