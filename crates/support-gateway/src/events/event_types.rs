//! Gateway event names
//!
//! The `t` field of every frame.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Events a client may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientEventType {
    Authenticate,
    JoinConversation,
    LeaveConversation,
    SendMessage,
    TypingStart,
    TypingStop,
    AssignConversation,
    CloseConversation,
    MarkRead,
    ListConversations,
    Heartbeat,
}

impl ClientEventType {
    /// Look up an event by its wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "authenticate" => Self::Authenticate,
            "join_conversation" => Self::JoinConversation,
            "leave_conversation" => Self::LeaveConversation,
            "send_message" => Self::SendMessage,
            "typing_start" => Self::TypingStart,
            "typing_stop" => Self::TypingStop,
            "assign_conversation" => Self::AssignConversation,
            "close_conversation" => Self::CloseConversation,
            "mark_read" => Self::MarkRead,
            "list_conversations" => Self::ListConversations,
            "heartbeat" => Self::Heartbeat,
            _ => return None,
        })
    }

    /// Events accepted before the handshake completes
    #[must_use]
    pub const fn allowed_unauthenticated(self) -> bool {
        matches!(self, Self::Authenticate | Self::Heartbeat)
    }
}

/// Events the server sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerEventType {
    // Handshake
    Authenticated,
    AuthError,

    // Conversations
    JoinedConversation,
    MessageHistory,
    AdminJoined,
    ConversationCreated,
    ConversationClosed,
    ConversationList,

    // Messages
    NewMessage,
    MessagesRead,

    // Presence
    UserTyping,
    UserOnline,
    UserOffline,

    // Connection
    HeartbeatAck,
    Error,
}

impl ServerEventType {
    /// Get the string representation of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::AuthError => "auth_error",
            Self::JoinedConversation => "joined_conversation",
            Self::MessageHistory => "message_history",
            Self::AdminJoined => "admin_joined",
            Self::ConversationCreated => "conversation_created",
            Self::ConversationClosed => "conversation_closed",
            Self::ConversationList => "conversation_list",
            Self::NewMessage => "new_message",
            Self::MessagesRead => "messages_read",
            Self::UserTyping => "user_typing",
            Self::UserOnline => "user_online",
            Self::UserOffline => "user_offline",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ServerEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ClientEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // serde names are the wire names
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(name)) => f.write_str(&name),
            _ => write!(f, "{self:?}"),
        }
    }
}
