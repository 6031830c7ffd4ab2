//! Repository bundle handed to the service layer

use std::sync::Arc;

use support_core::traits::{ConversationRepository, MessageRepository, ParticipantRepository};

use crate::memory::MemoryStore;
use crate::pool::PgPool;
use crate::repositories::{PgConversationRepository, PgMessageRepository, PgParticipantRepository};

/// One implementation of each store trait
#[derive(Clone)]
pub struct Repositories {
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub participants: Arc<dyn ParticipantRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            conversations: Arc::new(PgConversationRepository::new(pool.clone())),
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            participants: Arc::new(PgParticipantRepository::new(pool)),
        }
    }

    /// All three traits served by one in-memory store
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            conversations: store.clone(),
            messages: store.clone(),
            participants: store,
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
