//! # support-core
//!
//! Domain layer for the support chat: participants, conversations and their lifecycle,
//! messages, domain events, and the store/publisher ports the service layer depends on.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Assignment, Conversation, ConversationStatus, LastMessage, Message, MessageType, Participant,
    ParticipantRole, Priority, SenderType,
};
pub use error::DomainError;
pub use events::{DomainEvent, EventTarget};
pub use traits::{
    ConversationRepository, EventPublisher, HistoryPage, HistoryQuery, MessageRepository,
    NoopPublisher, ParticipantRepository, RepoResult,
};
pub use value_objects::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
