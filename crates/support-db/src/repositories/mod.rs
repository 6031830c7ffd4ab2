//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in support-core.

mod conversation;
mod error;
mod message;
mod participant;

pub use conversation::PgConversationRepository;
pub use message::PgMessageRepository;
pub use participant::PgParticipantRepository;
