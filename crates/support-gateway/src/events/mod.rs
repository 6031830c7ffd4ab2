//! Gateway events
//!
//! Event names and payload shapes for both directions.

mod event_types;
mod payloads;

pub use event_types::{ClientEventType, ServerEventType};
pub use payloads::{
    AdminJoinedPayload, AuthErrorPayload, AuthenticatePayload, AuthenticatedPayload,
    ConversationClosedPayload, ConversationListPayload, ErrorPayload, JoinedConversationPayload,
    MessageHistoryPayload, MessagesReadPayload, ServerEvent, UserOfflinePayload,
    UserOnlinePayload, UserTypingPayload,
};
