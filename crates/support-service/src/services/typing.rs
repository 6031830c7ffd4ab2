//! Typing indicators
//!
//! Nothing here is persisted. The tracker remembers who is typing where so that an
//! unmatched start expires after the configured timeout and a disconnect can broadcast the
//! stops its client never sent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use support_core::events::TypingEvent;
use support_core::{Conversation, DomainEvent, EventPublisher, EventTarget, ParticipantRole, Snowflake};
use tracing::{debug, instrument};

use crate::dto::Actor;

use super::context::ServiceContext;
use super::conversation::ConversationService;
use super::error::ServiceResult;

type TypingKey = (Snowflake, Snowflake);

#[derive(Debug, Clone)]
struct TypingEntry {
    generation: u64,
    role: ParticipantRole,
    target: EventTarget,
}

/// Live typing states keyed by `(conversation_id, user_id)`
pub struct TypingTracker {
    publisher: Arc<dyn EventPublisher>,
    timeout: Option<Duration>,
    active: Arc<DashMap<TypingKey, TypingEntry>>,
    generation: AtomicU64,
}

impl TypingTracker {
    /// `timeout` of `None` keeps a start alive until an explicit stop or disconnect
    pub fn new(publisher: Arc<dyn EventPublisher>, timeout: Option<Duration>) -> Self {
        Self {
            publisher,
            timeout,
            active: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Broadcast a start and arm its expiry
    pub fn start(&self, conversation: &Conversation, user_id: Snowflake, role: ParticipantRole) {
        let key = (conversation.id, user_id);
        let target = EventTarget::room_except(conversation, user_id);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        self.active.insert(
            key,
            TypingEntry {
                generation,
                role,
                target: target.clone(),
            },
        );
        self.publisher
            .publish(target, typing_event(key, role, true));

        if let Some(timeout) = self.timeout {
            let active = Arc::clone(&self.active);
            let publisher = Arc::clone(&self.publisher);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                // A newer start or an explicit stop bumped or removed the entry
                if let Some((_, entry)) = active.remove_if(&key, |_, e| e.generation == generation) {
                    debug!(conversation_id = %key.0, user_id = %key.1, "Typing expired");
                    publisher.publish(entry.target, typing_event(key, entry.role, false));
                }
            });
        }
    }

    /// Broadcast a stop
    pub fn stop(&self, conversation: &Conversation, user_id: Snowflake, role: ParticipantRole) {
        let key = (conversation.id, user_id);
        self.active.remove(&key);
        self.publisher.publish(
            EventTarget::room_except(conversation, user_id),
            typing_event(key, role, false),
        );
    }

    /// Stop everything `user_id` is typing; returns how many stops were broadcast
    pub fn clear_user(&self, user_id: Snowflake) -> usize {
        let keys: Vec<TypingKey> = self
            .active
            .iter()
            .filter(|entry| entry.key().1 == user_id)
            .map(|entry| *entry.key())
            .collect();

        let mut cleared = 0;
        for key in keys {
            if let Some((_, entry)) = self.active.remove(&key) {
                self.publisher
                    .publish(entry.target, typing_event(key, entry.role, false));
                cleared += 1;
            }
        }
        cleared
    }

    pub fn is_typing(&self, conversation_id: Snowflake, user_id: Snowflake) -> bool {
        self.active.contains_key(&(conversation_id, user_id))
    }
}

impl std::fmt::Debug for TypingTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingTracker")
            .field("timeout", &self.timeout)
            .field("active", &self.active.len())
            .finish_non_exhaustive()
    }
}

fn typing_event(key: TypingKey, role: ParticipantRole, is_typing: bool) -> DomainEvent {
    DomainEvent::TypingChanged(TypingEvent {
        conversation_id: key.0,
        user_id: key.1,
        role,
        is_typing,
    })
}

/// Typing service
pub struct TypingService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TypingService<'a> {
    /// Create a new TypingService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// `typing_start`: members of open conversations only
    #[instrument(skip(self))]
    pub async fn start(&self, actor: Actor, conversation_id: Snowflake) -> ServiceResult<()> {
        let conversation = ConversationService::new(self.ctx)
            .load(conversation_id)
            .await?;
        let role = conversation.ensure_member(actor.user_id)?;
        conversation.ensure_open()?;

        self.ctx.typing().start(&conversation, actor.user_id, role);
        Ok(())
    }

    /// `typing_stop`: members only
    #[instrument(skip(self))]
    pub async fn stop(&self, actor: Actor, conversation_id: Snowflake) -> ServiceResult<()> {
        let conversation = ConversationService::new(self.ctx)
            .load(conversation_id)
            .await?;
        let role = conversation.ensure_member(actor.user_id)?;

        self.ctx.typing().stop(&conversation, actor.user_id, role);
        Ok(())
    }
}
