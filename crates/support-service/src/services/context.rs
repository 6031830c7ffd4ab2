//! Service context - dependency container for services
//!
//! Holds the store adapters, the event publisher, ID generation, token validation, the
//! keyed locks that serialize state changes and the typing tracker.

use std::sync::Arc;

use support_common::{ChatConfig, JwtService};
use support_core::traits::{
    ConversationRepository, EventPublisher, MessageRepository, ParticipantRepository,
};
use support_core::{Snowflake, SnowflakeGenerator};
use support_db::Repositories;

use crate::locks::KeyedLocks;

use super::error::{ServiceError, ServiceResult};
use super::typing::TypingTracker;

/// Service context containing all dependencies
///
/// Cheap to clone: every field is shared. One context is built at startup and handed to
/// each connection task.
#[derive(Clone)]
pub struct ServiceContext {
    // Store adapters
    repositories: Repositories,

    // Fan-out
    publisher: Arc<dyn EventPublisher>,

    // Services
    jwt_service: Arc<JwtService>,
    snowflake_generator: Arc<SnowflakeGenerator>,
    chat: Arc<ChatConfig>,

    // Serialization
    conversation_locks: Arc<KeyedLocks>,
    customer_locks: Arc<KeyedLocks>,

    // Ephemeral state
    typing: Arc<TypingTracker>,
}

impl ServiceContext {
    /// Create a new service context with all dependencies
    pub fn new(
        repositories: Repositories,
        publisher: Arc<dyn EventPublisher>,
        jwt_service: Arc<JwtService>,
        snowflake_generator: Arc<SnowflakeGenerator>,
        chat: ChatConfig,
    ) -> Self {
        let typing = Arc::new(TypingTracker::new(
            Arc::clone(&publisher),
            chat.typing_timeout(),
        ));

        Self {
            repositories,
            publisher,
            jwt_service,
            snowflake_generator,
            chat: Arc::new(chat),
            conversation_locks: Arc::new(KeyedLocks::new()),
            customer_locks: Arc::new(KeyedLocks::new()),
            typing,
        }
    }

    // === Repositories ===

    /// Get the conversation repository
    pub fn conversation_repo(&self) -> &dyn ConversationRepository {
        self.repositories.conversations.as_ref()
    }

    /// Get the message repository
    pub fn message_repo(&self) -> &dyn MessageRepository {
        self.repositories.messages.as_ref()
    }

    /// Get the participant repository
    pub fn participant_repo(&self) -> &dyn ParticipantRepository {
        self.repositories.participants.as_ref()
    }

    // === Fan-out ===

    /// Get the event publisher
    pub fn publisher(&self) -> &dyn EventPublisher {
        self.publisher.as_ref()
    }

    // === Services ===

    /// Get the JWT service
    pub fn jwt_service(&self) -> &JwtService {
        self.jwt_service.as_ref()
    }

    /// Chat protocol tuning
    pub fn chat_config(&self) -> &ChatConfig {
        self.chat.as_ref()
    }

    /// Generate a new Snowflake ID
    pub fn generate_id(&self) -> Snowflake {
        self.snowflake_generator.generate()
    }

    // === Serialization ===

    /// One lock per conversation: sends, closes, assignments and read marks
    pub fn conversation_locks(&self) -> &KeyedLocks {
        self.conversation_locks.as_ref()
    }

    /// One lock per customer: guards find-or-create of the open conversation
    pub fn customer_locks(&self) -> &KeyedLocks {
        self.customer_locks.as_ref()
    }

    pub fn typing(&self) -> &TypingTracker {
        self.typing.as_ref()
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repositories", &self.repositories)
            .field("chat", &self.chat)
            .field("conversation_locks", &self.conversation_locks.len())
            .field("customer_locks", &self.customer_locks.len())
            .finish_non_exhaustive()
    }
}

/// Builder for creating ServiceContext with custom configuration
#[derive(Default)]
pub struct ServiceContextBuilder {
    repositories: Option<Repositories>,
    publisher: Option<Arc<dyn EventPublisher>>,
    jwt_service: Option<Arc<JwtService>>,
    snowflake_generator: Option<Arc<SnowflakeGenerator>>,
    chat: Option<ChatConfig>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repositories(mut self, repositories: Repositories) -> Self {
        self.repositories = Some(repositories);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn jwt_service(mut self, service: Arc<JwtService>) -> Self {
        self.jwt_service = Some(service);
        self
    }

    pub fn snowflake_generator(mut self, generator: Arc<SnowflakeGenerator>) -> Self {
        self.snowflake_generator = Some(generator);
        self
    }

    /// Defaults to [`ChatConfig::default`] when not set
    pub fn chat_config(mut self, chat: ChatConfig) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        Ok(ServiceContext::new(
            self.repositories
                .ok_or_else(|| ServiceError::validation("repositories are required"))?,
            self.publisher
                .ok_or_else(|| ServiceError::validation("publisher is required"))?,
            self.jwt_service
                .ok_or_else(|| ServiceError::validation("jwt_service is required"))?,
            self.snowflake_generator
                .ok_or_else(|| ServiceError::validation("snowflake_generator is required"))?,
            self.chat.unwrap_or_default(),
        ))
    }
}
