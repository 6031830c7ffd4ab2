//! In-memory conversation store
//!
//! Implements every repository trait over `parking_lot` locked maps. Used for local
//! development (`STORE_BACKEND=memory`) and by the service and gateway tests. Enforces the
//! same constraints as the PostgreSQL schema, including one open conversation per customer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use support_core::entities::{Conversation, ConversationStatus, Message, Participant};
use support_core::error::DomainError;
use support_core::traits::{
    ConversationRepository, HistoryPage, HistoryQuery, MessageRepository, ParticipantRepository,
    RepoResult,
};
use support_core::value_objects::Snowflake;

#[derive(Debug, Default)]
struct MemoryState {
    participants: HashMap<Snowflake, Participant>,
    conversations: HashMap<Snowflake, Conversation>,
    /// Per conversation, sorted by message ID
    messages: HashMap<Snowflake, Vec<Message>>,
}

/// Process-local implementation of the conversation store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_writes: AtomicBool,
    fail_conversation_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a database error (until reset)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make conversation updates alone fail, leaving appends and inserts working
    pub fn set_fail_conversation_updates(&self, fail: bool) {
        self.fail_conversation_updates.store(fail, Ordering::SeqCst);
    }

    /// Total stored messages in a conversation
    pub fn message_count(&self, conversation_id: Snowflake) -> usize {
        self.state
            .read()
            .messages
            .get(&conversation_id)
            .map_or(0, Vec::len)
    }

    fn check_writable(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError(
                "store rejected the write".to_string(),
            ));
        }
        Ok(())
    }
}

fn sorted_by_recency(mut conversations: Vec<Conversation>) -> Vec<Conversation> {
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
    conversations
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn create(&self, conversation: &Conversation) -> RepoResult<()> {
        self.check_writable()?;
        let mut state = self.state.write();

        if state.conversations.contains_key(&conversation.id) {
            return Err(DomainError::DatabaseError(format!(
                "duplicate conversation id {}",
                conversation.id
            )));
        }
        if conversation.is_open()
            && state
                .conversations
                .values()
                .any(|c| c.customer_id == conversation.customer_id && c.is_open())
        {
            return Err(DomainError::OpenConversationExists(conversation.customer_id));
        }

        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>> {
        Ok(self.state.read().conversations.get(&id).cloned())
    }

    async fn find_open_by_customer(
        &self,
        customer_id: Snowflake,
    ) -> RepoResult<Option<Conversation>> {
        Ok(self
            .state
            .read()
            .conversations
            .values()
            .find(|c| c.customer_id == customer_id && c.is_open())
            .cloned())
    }

    async fn list_active(&self) -> RepoResult<Vec<Conversation>> {
        let state = self.state.read();
        Ok(sorted_by_recency(
            state.conversations.values().filter(|c| c.is_open()).cloned().collect(),
        ))
    }

    async fn list_by_status(&self, status: ConversationStatus) -> RepoResult<Vec<Conversation>> {
        let state = self.state.read();
        Ok(sorted_by_recency(
            state
                .conversations
                .values()
                .filter(|c| c.status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_agent(&self, agent_id: Snowflake) -> RepoResult<Vec<Conversation>> {
        let state = self.state.read();
        Ok(sorted_by_recency(
            state
                .conversations
                .values()
                .filter(|c| c.agent_id == Some(agent_id))
                .cloned()
                .collect(),
        ))
    }

    async fn update(&self, conversation: &Conversation) -> RepoResult<()> {
        self.check_writable()?;
        if self.fail_conversation_updates.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError(
                "store rejected the conversation update".to_string(),
            ));
        }
        let mut state = self.state.write();

        match state.conversations.get_mut(&conversation.id) {
            Some(stored) => {
                *stored = conversation.clone();
                Ok(())
            }
            None => Err(DomainError::ConversationNotFound(conversation.id)),
        }
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn append(&self, message: &Message) -> RepoResult<()> {
        self.check_writable()?;
        let mut state = self.state.write();

        if !state.conversations.contains_key(&message.conversation_id) {
            return Err(DomainError::ConversationNotFound(message.conversation_id));
        }

        let messages = state.messages.entry(message.conversation_id).or_default();
        match messages.binary_search_by_key(&message.id, |m| m.id) {
            Ok(_) => Err(DomainError::DatabaseError(format!(
                "duplicate message id {}",
                message.id
            ))),
            Err(pos) => {
                messages.insert(pos, message.clone());
                Ok(())
            }
        }
    }

    async fn find_by_conversation(
        &self,
        conversation_id: Snowflake,
        query: HistoryQuery,
    ) -> RepoResult<HistoryPage> {
        let state = self.state.read();
        let Some(messages) = state.messages.get(&conversation_id) else {
            return Ok(HistoryPage::default());
        };

        let end = match query.before {
            Some(before) => messages.partition_point(|m| m.id < before),
            None => messages.len(),
        };
        let limit = query.limit as usize;
        let start = end.saturating_sub(limit);

        Ok(HistoryPage {
            messages: messages[start..end].to_vec(),
            has_more: start > 0,
        })
    }

    async fn mark_read(
        &self,
        conversation_id: Snowflake,
        reader_id: Snowflake,
        read_at: DateTime<Utc>,
    ) -> RepoResult<u64> {
        self.check_writable()?;
        let mut state = self.state.write();

        let changed = state
            .messages
            .get_mut(&conversation_id)
            .map_or(0, |messages| {
                messages
                    .iter_mut()
                    .filter(|m| m.sender_id != reader_id)
                    .filter_map(|m| m.mark_read(read_at).then_some(()))
                    .count()
            });
        Ok(changed as u64)
    }

    async fn unread_count(&self, conversation_id: Snowflake, reader_id: Snowflake) -> RepoResult<u64> {
        let state = self.state.read();
        let count = state.messages.get(&conversation_id).map_or(0, |messages| {
            messages.iter().filter(|m| m.is_unread_for(reader_id)).count()
        });
        Ok(count as u64)
    }
}

#[async_trait]
impl ParticipantRepository for MemoryStore {
    async fn upsert(&self, participant: &Participant) -> RepoResult<()> {
        self.check_writable()?;
        self.state
            .write()
            .participants
            .insert(participant.id, participant.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Participant>> {
        Ok(self.state.read().participants.get(&id).cloned())
    }

    async fn update_online_status(
        &self,
        id: Snowflake,
        online: bool,
        last_seen_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.check_writable()?;
        let mut state = self.state.write();

        let participant = state
            .participants
            .get_mut(&id)
            .ok_or(DomainError::ParticipantNotFound(id))?;
        participant.online = online;
        participant.last_seen_at = last_seen_at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use support_core::entities::{MessageType, ParticipantRole, SenderType};

    const CUSTOMER: Snowflake = Snowflake::new(100);
    const AGENT: Snowflake = Snowflake::new(200);

    fn message(id: i64, conversation_id: Snowflake, sender: Snowflake) -> Message {
        let sender_type = if sender == CUSTOMER {
            SenderType::Customer
        } else {
            SenderType::Agent
        };
        Message::new(
            Snowflake::new(id),
            conversation_id,
            sender,
            sender_type,
            format!("message {id}"),
            MessageType::Text,
        )
    }

    #[tokio::test]
    async fn test_single_open_conversation_per_customer() {
        let store = MemoryStore::new();
        let first = Conversation::start(Snowflake::new(1), CUSTOMER);
        ConversationRepository::create(&store, &first).await.unwrap();

        let second = Conversation::start(Snowflake::new(2), CUSTOMER);
        let err = ConversationRepository::create(&store, &second)
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Closing the first frees the slot
        let mut closed = first.clone();
        closed.close();
        store.update(&closed).await.unwrap();
        ConversationRepository::create(&store, &second).await.unwrap();

        let open = store.find_open_by_customer(CUSTOMER).await.unwrap().unwrap();
        assert_eq!(open.id, second.id);
        assert_eq!(store.list_active().await.unwrap().len(), 1);
        assert_eq!(
            store
                .list_by_status(ConversationStatus::Closed)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_history_pages_ascending() {
        let store = MemoryStore::new();
        let conv = Conversation::start(Snowflake::new(1), CUSTOMER);
        ConversationRepository::create(&store, &conv).await.unwrap();

        for id in 10..20 {
            store.append(&message(id, conv.id, CUSTOMER)).await.unwrap();
        }

        let page = store
            .find_by_conversation(conv.id, HistoryQuery::new(None, Some(4)))
            .await
            .unwrap();
        let ids: Vec<i64> = page.messages.iter().map(|m| m.id.into_inner()).collect();
        assert_eq!(ids, vec![16, 17, 18, 19]);
        assert!(page.has_more);

        let page = store
            .find_by_conversation(conv.id, HistoryQuery::new(Some(Snowflake::new(12)), Some(4)))
            .await
            .unwrap();
        let ids: Vec<i64> = page.messages.iter().map(|m| m.id.into_inner()).collect();
        assert_eq!(ids, vec![10, 11]);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_skips_own_messages() {
        let store = MemoryStore::new();
        let conv = Conversation::start(Snowflake::new(1), CUSTOMER);
        ConversationRepository::create(&store, &conv).await.unwrap();
        store.append(&message(10, conv.id, CUSTOMER)).await.unwrap();
        store.append(&message(11, conv.id, AGENT)).await.unwrap();
        store.append(&message(12, conv.id, CUSTOMER)).await.unwrap();

        assert_eq!(store.unread_count(conv.id, AGENT).await.unwrap(), 2);
        assert_eq!(store.mark_read(conv.id, AGENT, Utc::now()).await.unwrap(), 2);
        assert_eq!(store.mark_read(conv.id, AGENT, Utc::now()).await.unwrap(), 0);
        assert_eq!(store.unread_count(conv.id, AGENT).await.unwrap(), 0);
        assert_eq!(store.unread_count(conv.id, CUSTOMER).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_append_requires_conversation() {
        let store = MemoryStore::new();
        let err = store
            .append(&message(10, Snowflake::new(99), CUSTOMER))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failed_writes() {
        let store = MemoryStore::new();
        let conv = Conversation::start(Snowflake::new(1), CUSTOMER);
        ConversationRepository::create(&store, &conv).await.unwrap();

        store.set_fail_writes(true);
        let err = store.append(&message(10, conv.id, CUSTOMER)).await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(store.message_count(conv.id), 0);

        store.set_fail_writes(false);
        store.append(&message(10, conv.id, CUSTOMER)).await.unwrap();
        assert_eq!(store.message_count(conv.id), 1);
    }

    #[tokio::test]
    async fn test_participant_presence() {
        let store = MemoryStore::new();
        let err = store
            .update_online_status(CUSTOMER, false, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        store
            .upsert(&Participant::online(CUSTOMER, ParticipantRole::Customer))
            .await
            .unwrap();
        store
            .update_online_status(CUSTOMER, false, Utc::now())
            .await
            .unwrap();
        let stored = ParticipantRepository::find_by_id(&store, CUSTOMER)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.online);
    }
}
