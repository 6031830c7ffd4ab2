//! Message entity <-> model mapper

use support_core::entities::Message;
use support_core::value_objects::Snowflake;
use support_core::DomainError;

use super::corrupt_column;
use crate::models::MessageModel;

/// Convert MessageModel to Message entity
impl TryFrom<MessageModel> for Message {
    type Error = DomainError;

    fn try_from(model: MessageModel) -> Result<Self, Self::Error> {
        Ok(Message {
            id: Snowflake::new(model.id),
            conversation_id: Snowflake::new(model.conversation_id),
            sender_id: Snowflake::new(model.sender_id),
            sender_type: model
                .sender_type
                .parse()
                .map_err(|e| corrupt_column("messages.sender_type", e))?,
            content: model.content,
            message_type: model
                .message_type
                .parse()
                .map_err(|e| corrupt_column("messages.message_type", e))?,
            created_at: model.created_at,
            read: model.is_read,
            read_at: model.read_at,
        })
    }
}

/// Convert Message entity reference to values for database insertion
pub struct MessageInsert<'a> {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_type: &'static str,
    pub content: &'a str,
    pub message_type: &'static str,
}

impl<'a> MessageInsert<'a> {
    pub fn new(message: &'a Message) -> Self {
        Self {
            id: message.id.into_inner(),
            conversation_id: message.conversation_id.into_inner(),
            sender_id: message.sender_id.into_inner(),
            sender_type: message.sender_type.as_str(),
            content: &message.content,
            message_type: message.message_type.as_str(),
        }
    }
}
