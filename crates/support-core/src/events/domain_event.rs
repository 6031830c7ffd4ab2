//! Domain events - emitted by the service layer once a state change is durable
//!
//! Each event is paired with an [`EventTarget`] when published; the publisher resolves the
//! target to live connections. Events are never emitted for rejected actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Conversation, Message, ParticipantRole};
use crate::value_objects::Snowflake;

/// Who should receive an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTarget {
    /// Live members of a conversation room: the customer and the assigned agent, each only if
    /// connected and joined to the room on their current connection
    Room {
        conversation_id: Snowflake,
        customer_id: Snowflake,
        agent_id: Option<Snowflake>,
        exclude: Option<Snowflake>,
    },
    /// Every connected participant with this role
    Role {
        role: ParticipantRole,
        exclude: Option<Snowflake>,
    },
    /// Specific participants, regardless of room membership
    Users(Vec<Snowflake>),
}

impl EventTarget {
    /// Room of `conversation` as currently persisted
    pub fn room(conversation: &Conversation) -> Self {
        Self::Room {
            conversation_id: conversation.id,
            customer_id: conversation.customer_id,
            agent_id: conversation.agent_id,
            exclude: None,
        }
    }

    /// Room of `conversation` minus `user_id`
    pub fn room_except(conversation: &Conversation, user_id: Snowflake) -> Self {
        Self::Room {
            conversation_id: conversation.id,
            customer_id: conversation.customer_id,
            agent_id: conversation.agent_id,
            exclude: Some(user_id),
        }
    }

    /// All connected agents
    pub fn agents() -> Self {
        Self::Role {
            role: ParticipantRole::Agent,
            exclude: None,
        }
    }

    /// All connected agents except `user_id`
    pub fn agents_except(user_id: Snowflake) -> Self {
        Self::Role {
            role: ParticipantRole::Agent,
            exclude: Some(user_id),
        }
    }
}

/// All possible domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    // =========================================================================
    // Conversation Events
    // =========================================================================
    ConversationCreated(Box<Conversation>),
    AgentJoined(AgentJoinedEvent),
    ConversationClosed(ConversationClosedEvent),

    // =========================================================================
    // Message Events
    // =========================================================================
    MessageCreated(Box<Message>),
    MessagesRead(MessagesReadEvent),

    // =========================================================================
    // Presence Events
    // =========================================================================
    TypingChanged(TypingEvent),
    ParticipantOnline(PresenceEvent),
    ParticipantOffline(PresenceEvent),
}

impl DomainEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConversationCreated(_) => "CONVERSATION_CREATED",
            Self::AgentJoined(_) => "AGENT_JOINED",
            Self::ConversationClosed(_) => "CONVERSATION_CLOSED",
            Self::MessageCreated(_) => "MESSAGE_CREATED",
            Self::MessagesRead(_) => "MESSAGES_READ",
            Self::TypingChanged(_) => "TYPING_CHANGED",
            Self::ParticipantOnline(_) => "PARTICIPANT_ONLINE",
            Self::ParticipantOffline(_) => "PARTICIPANT_OFFLINE",
        }
    }

    /// Conversation the event belongs to, if any
    pub fn conversation_id(&self) -> Option<Snowflake> {
        match self {
            Self::ConversationCreated(c) => Some(c.id),
            Self::AgentJoined(e) => Some(e.conversation_id),
            Self::ConversationClosed(e) => Some(e.conversation_id),
            Self::MessageCreated(m) => Some(m.conversation_id),
            Self::MessagesRead(e) => Some(e.conversation_id),
            Self::TypingChanged(e) => Some(e.conversation_id),
            Self::ParticipantOnline(_) | Self::ParticipantOffline(_) => None,
        }
    }
}

// ============================================================================
// Event Structs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentJoinedEvent {
    pub conversation_id: Snowflake,
    pub agent_id: Snowflake,
    pub previous_agent_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationClosedEvent {
    pub conversation_id: Snowflake,
    pub closed_by: Snowflake,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesReadEvent {
    pub conversation_id: Snowflake,
    pub reader_id: Snowflake,
    pub count: u64,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEvent {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    pub role: ParticipantRole,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub user_id: Snowflake,
    pub role: ParticipantRole,
    pub last_seen_at: DateTime<Utc>,
}
