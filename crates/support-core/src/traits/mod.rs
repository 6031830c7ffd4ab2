//! Ports implemented by the infrastructure and gateway layers

mod publisher;
mod repositories;

pub use publisher::{EventPublisher, NoopPublisher};
pub use repositories::{
    ConversationRepository, HistoryPage, HistoryQuery, MessageRepository, ParticipantRepository,
    RepoResult,
};
