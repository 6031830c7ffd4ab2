//! Repository traits (ports) - the conversation store adapter
//!
//! The domain layer defines what it needs, and the infrastructure layer provides the
//! implementation (PostgreSQL or in-memory).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{Conversation, ConversationStatus, Message, Participant};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Conversation Repository
// ============================================================================

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Insert a new conversation
    ///
    /// Fails with [`DomainError::OpenConversationExists`] if the customer already has a
    /// non-closed conversation.
    async fn create(&self, conversation: &Conversation) -> RepoResult<()>;

    /// Find conversation by ID
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>>;

    /// The customer's non-closed conversation, if any
    async fn find_open_by_customer(&self, customer_id: Snowflake)
        -> RepoResult<Option<Conversation>>;

    /// All non-closed conversations, most recently updated first
    async fn list_active(&self) -> RepoResult<Vec<Conversation>>;

    /// Conversations in one status, most recently updated first
    async fn list_by_status(&self, status: ConversationStatus) -> RepoResult<Vec<Conversation>>;

    /// Conversations assigned to an agent, most recently updated first
    async fn list_by_agent(&self, agent_id: Snowflake) -> RepoResult<Vec<Conversation>>;

    /// Persist the mutable fields of an existing conversation
    async fn update(&self, conversation: &Conversation) -> RepoResult<()>;
}

// ============================================================================
// Message Repository
// ============================================================================

/// Page request for message history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Only messages with an ID lower than this one
    pub before: Option<Snowflake>,
    pub limit: u32,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 100;

    /// Latest page, clamping `limit` to `1..=MAX_LIMIT`
    pub fn new(before: Option<Snowflake>, limit: Option<u32>) -> Self {
        Self {
            before,
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of history, oldest message first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    /// Older messages exist before the first one returned
    pub has_more: bool,
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a message to its conversation
    async fn append(&self, message: &Message) -> RepoResult<()>;

    /// The newest `query.limit` messages older than `query.before`, in ascending order
    async fn find_by_conversation(
        &self,
        conversation_id: Snowflake,
        query: HistoryQuery,
    ) -> RepoResult<HistoryPage>;

    /// Mark every unread message not sent by `reader_id` as read; returns how many changed
    async fn mark_read(
        &self,
        conversation_id: Snowflake,
        reader_id: Snowflake,
        read_at: DateTime<Utc>,
    ) -> RepoResult<u64>;

    /// Messages not sent by `reader_id` that are still unread
    async fn unread_count(&self, conversation_id: Snowflake, reader_id: Snowflake)
        -> RepoResult<u64>;
}

// ============================================================================
// Participant Repository
// ============================================================================

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Insert the participant or overwrite role, online flag and last-seen
    async fn upsert(&self, participant: &Participant) -> RepoResult<()>;

    /// Find participant by ID
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Participant>>;

    /// Flip the online flag and stamp last-seen
    async fn update_online_status(
        &self,
        id: Snowflake,
        online: bool,
        last_seen_at: DateTime<Utc>,
    ) -> RepoResult<()>;
}
