//! # support-service
//!
//! Application layer: the conversation state machine, message delivery, presence and typing.
//! Services borrow a [`ServiceContext`] and publish their side effects through the
//! [`support_core::EventPublisher`] it carries, never touching connections directly.

pub mod dto;
pub mod locks;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use dto::{
    Actor, AssignRequest, CloseOutcome, ConversationRef, HistoryRequest, JoinedConversation,
    ListConversationsRequest, SendMessageRequest,
};
pub use locks::KeyedLocks;
pub use services::{
    ConversationService, MessageService, PresenceService, ServiceContext,
    ServiceContextBuilder, ServiceError, ServiceResult, TypingService, TypingTracker,
};
