//! Event payloads
//!
//! Wire shapes of every server event, plus the client `authenticate` payload (the other
//! client payloads are the service request types). Field names are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use support_core::{Conversation, DomainEvent, HistoryPage, Message, ParticipantRole, Snowflake};

use super::ServerEventType;

// ============================================================================
// Client payloads
// ============================================================================

/// `authenticate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatePayload {
    pub user_id: Snowflake,
    pub user_type: ParticipantRole,
    pub token: String,
}

// ============================================================================
// Server payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedPayload {
    pub user_id: Snowflake,
    pub user_type: ParticipantRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthErrorPayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedConversationPayload {
    pub conversation_id: Snowflake,
    pub conversation: Conversation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHistoryPayload {
    pub conversation_id: Snowflake,
    /// Oldest first
    pub messages: Vec<Message>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminJoinedPayload {
    pub conversation_id: Snowflake,
    pub admin_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_admin_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationClosedPayload {
    pub conversation_id: Snowflake,
    pub closed_by: Snowflake,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationListPayload {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadPayload {
    pub conversation_id: Snowflake,
    /// The reader
    pub user_id: Snowflake,
    pub count: u64,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingPayload {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    pub user_type: ParticipantRole,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOnlinePayload {
    pub user_id: Snowflake,
    pub user_type: ParticipantRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOfflinePayload {
    pub user_id: Snowflake,
    pub user_type: ParticipantRole,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

// ============================================================================
// Server event
// ============================================================================

/// A server event ready to be framed; the writer task adds the sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    pub kind: ServerEventType,
    pub data: Value,
}

impl ServerEvent {
    pub fn new<T: Serialize>(kind: ServerEventType, payload: &T) -> Self {
        Self {
            kind,
            data: serde_json::to_value(payload).unwrap_or_default(),
        }
    }

    pub fn authenticated(user_id: Snowflake, user_type: ParticipantRole) -> Self {
        Self::new(
            ServerEventType::Authenticated,
            &AuthenticatedPayload { user_id, user_type },
        )
    }

    pub fn auth_error(message: impl Into<String>) -> Self {
        Self::new(
            ServerEventType::AuthError,
            &AuthErrorPayload {
                message: message.into(),
            },
        )
    }

    pub fn joined_conversation(conversation: &Conversation) -> Self {
        Self::new(
            ServerEventType::JoinedConversation,
            &JoinedConversationPayload {
                conversation_id: conversation.id,
                conversation: conversation.clone(),
            },
        )
    }

    pub fn message_history(conversation_id: Snowflake, page: &HistoryPage) -> Self {
        Self::new(
            ServerEventType::MessageHistory,
            &MessageHistoryPayload {
                conversation_id,
                messages: page.messages.clone(),
                has_more: page.has_more,
            },
        )
    }

    pub fn new_message(message: &Message) -> Self {
        Self::new(ServerEventType::NewMessage, message)
    }

    pub fn conversation_closed(
        conversation_id: Snowflake,
        closed_by: Snowflake,
        closed_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            ServerEventType::ConversationClosed,
            &ConversationClosedPayload {
                conversation_id,
                closed_by,
                closed_at,
            },
        )
    }

    pub fn conversation_list(conversations: Vec<Conversation>) -> Self {
        Self::new(
            ServerEventType::ConversationList,
            &ConversationListPayload { conversations },
        )
    }

    pub fn heartbeat_ack() -> Self {
        Self {
            kind: ServerEventType::HeartbeatAck,
            data: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ServerEventType::Error,
            &ErrorPayload {
                code: code.into(),
                message: message.into(),
            },
        )
    }
}

impl From<&DomainEvent> for ServerEvent {
    fn from(event: &DomainEvent) -> Self {
        match event {
            DomainEvent::ConversationCreated(conversation) => {
                Self::new(ServerEventType::ConversationCreated, conversation.as_ref())
            }
            DomainEvent::AgentJoined(e) => Self::new(
                ServerEventType::AdminJoined,
                &AdminJoinedPayload {
                    conversation_id: e.conversation_id,
                    admin_id: e.agent_id,
                    previous_admin_id: e.previous_agent_id,
                },
            ),
            DomainEvent::ConversationClosed(e) => {
                Self::conversation_closed(e.conversation_id, e.closed_by, e.closed_at)
            }
            DomainEvent::MessageCreated(message) => Self::new_message(message),
            DomainEvent::MessagesRead(e) => Self::new(
                ServerEventType::MessagesRead,
                &MessagesReadPayload {
                    conversation_id: e.conversation_id,
                    user_id: e.reader_id,
                    count: e.count,
                    read_at: e.read_at,
                },
            ),
            DomainEvent::TypingChanged(e) => Self::new(
                ServerEventType::UserTyping,
                &UserTypingPayload {
                    conversation_id: e.conversation_id,
                    user_id: e.user_id,
                    user_type: e.role,
                    is_typing: e.is_typing,
                },
            ),
            DomainEvent::ParticipantOnline(e) => Self::new(
                ServerEventType::UserOnline,
                &UserOnlinePayload {
                    user_id: e.user_id,
                    user_type: e.role,
                },
            ),
            DomainEvent::ParticipantOffline(e) => Self::new(
                ServerEventType::UserOffline,
                &UserOfflinePayload {
                    user_id: e.user_id,
                    user_type: e.role,
                    last_seen_at: e.last_seen_at,
                },
            ),
        }
    }
}
