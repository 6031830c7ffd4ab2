//! Domain entities - core business objects

mod conversation;
mod message;
mod participant;

pub use conversation::{
    Assignment, Conversation, ConversationStatus, LastMessage, Priority, PREVIEW_LENGTH,
};
pub use message::{Message, MessageType, SenderType, MAX_CONTENT_LENGTH};
pub use participant::{Participant, ParticipantRole};
