//! Message service
//!
//! Delivery runs under the conversation lock: resolve, check state and membership,
//! persist, publish. A message is broadcast only after it is durable, and no message is
//! accepted once a concurrent close has committed.
//!
//! The conversation summary (last message, unread counters) is updated after the append on
//! a best-effort basis. If that write fails the send still succeeds: the message is
//! durable and read state lives on the messages themselves. The next message rewrites the
//! summary and the next read clears the counter.

use support_core::entities::SenderType;
use support_core::{DomainEvent, EventTarget, Message, MessageType};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{Actor, SendMessageRequest};

use super::context::ServiceContext;
use super::conversation::ConversationService;
use super::error::{ServiceError, ServiceResult};

/// Message service
pub struct MessageService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MessageService<'a> {
    /// Create a new MessageService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Send a message
    ///
    /// A customer may omit the conversation: their open conversation is used, or a new
    /// one is started.
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn send(&self, actor: Actor, request: SendMessageRequest) -> ServiceResult<Message> {
        request.validate()?;
        if request.message_type == MessageType::System {
            return Err(ServiceError::validation(
                "System messages cannot be sent by clients",
            ));
        }

        let conversations = ConversationService::new(self.ctx);
        let conversation_id = match request.conversation_id {
            Some(id) => id,
            None if actor.is_agent() => {
                return Err(ServiceError::validation("conversationId is required"));
            }
            None => conversations.find_or_start(actor.user_id).await?.id,
        };

        let _guard = self.ctx.conversation_locks().lock(conversation_id).await;

        let mut conversation = conversations.load(conversation_id).await?;
        conversation.ensure_open()?;
        let role = conversation.ensure_member(actor.user_id)?;

        // Generated under the lock: ID order is send order
        let message = Message::new(
            self.ctx.generate_id(),
            conversation_id,
            actor.user_id,
            SenderType::from(role),
            request.content.trim().to_string(),
            request.message_type,
        );

        self.ctx.message_repo().append(&message).await?;

        conversation.record_message(&message);
        if let Err(e) = self.ctx.conversation_repo().update(&conversation).await {
            // The message itself is durable; only the summary columns are stale
            warn!(error = %e, conversation_id = %conversation_id, "Failed to update conversation summary");
        }

        info!(message_id = %message.id, conversation_id = %conversation_id, "Message created");

        self.ctx.publisher().publish(
            EventTarget::room(&conversation),
            DomainEvent::MessageCreated(Box::new(message.clone())),
        );

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ConversationService;
    use crate::testing::{harness, id};
    use std::sync::Arc;
    use support_core::Snowflake;

    const CUSTOMER: i64 = 100;
    const AGENT: i64 = 200;

    #[tokio::test]
    async fn test_first_message_starts_conversation() {
        let h = harness();
        let message = MessageService::new(&h.ctx)
            .send(
                Actor::customer(id(CUSTOMER)),
                SendMessageRequest::text(None, "  I need help with my order  "),
            )
            .await
            .unwrap();

        assert_eq!(message.content, "I need help with my order");
        assert_eq!(message.sender_type, SenderType::Customer);
        assert_eq!(
            h.publisher.event_types(),
            vec!["CONVERSATION_CREATED", "MESSAGE_CREATED"]
        );
        // The customer joined the room before the broadcast
        assert_eq!(h.publisher.joins(), vec![(id(CUSTOMER), message.conversation_id)]);

        let conversation = ConversationService::new(&h.ctx)
            .load(message.conversation_id)
            .await
            .unwrap();
        assert_eq!(conversation.agent_unread, 1);
        assert_eq!(conversation.last_message.map(|m| m.id), Some(message.id));
    }

    #[tokio::test]
    async fn test_rejects_invalid_content() {
        let h = harness();
        let service = MessageService::new(&h.ctx);

        let err = service
            .send(Actor::customer(id(CUSTOMER)), SendMessageRequest::text(None, "   "))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = service
            .send(
                Actor::customer(id(CUSTOMER)),
                SendMessageRequest {
                    conversation_id: None,
                    content: "maintenance".into(),
                    message_type: MessageType::System,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = service
            .send(Actor::agent(id(AGENT)), SendMessageRequest::text(None, "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(h.publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let h = harness();
        let err = MessageService::new(&h.ctx)
            .send(
                Actor::customer(id(CUSTOMER)),
                SendMessageRequest::text(Some(id(999)), "hello"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_non_member_cannot_send() {
        let h = harness();
        let conversation = h.open_conversation(id(CUSTOMER), None).await;
        h.publisher.clear();

        // Unassigned agent
        let err = MessageService::new(&h.ctx)
            .send(
                Actor::agent(id(AGENT)),
                SendMessageRequest::text(Some(conversation.id), "hello"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");
        assert!(h.publisher.events().is_empty());
        assert_eq!(h.store.message_count(conversation.id), 0);
    }

    #[tokio::test]
    async fn test_closed_conversation_rejects_messages() {
        let h = harness();
        let conversation = h.open_conversation(id(CUSTOMER), Some(id(AGENT))).await;
        ConversationService::new(&h.ctx)
            .close(Actor::agent(id(AGENT)), conversation.id)
            .await
            .unwrap();
        h.publisher.clear();

        let err = MessageService::new(&h.ctx)
            .send(
                Actor::customer(id(CUSTOMER)),
                SendMessageRequest::text(Some(conversation.id), "are you there?"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TERMINAL_STATE");
        assert!(h.publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_broadcast() {
        let h = harness();
        let conversation = h.open_conversation(id(CUSTOMER), Some(id(AGENT))).await;
        h.publisher.clear();
        h.store.set_fail_writes(true);

        let err = MessageService::new(&h.ctx)
            .send(
                Actor::agent(id(AGENT)),
                SendMessageRequest::text(Some(conversation.id), "lost?"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        assert!(h.publisher.events().is_empty());
        assert_eq!(h.store.message_count(conversation.id), 0);
    }

    #[tokio::test]
    async fn test_summary_failure_still_delivers() {
        let h = harness();
        let conversation = h.open_conversation(id(CUSTOMER), Some(id(AGENT))).await;
        h.publisher.clear();
        h.store.set_fail_conversation_updates(true);

        let message = MessageService::new(&h.ctx)
            .send(
                Actor::customer(id(CUSTOMER)),
                SendMessageRequest::text(Some(conversation.id), "still here"),
            )
            .await
            .unwrap();
        assert_eq!(h.store.message_count(conversation.id), 1);
        assert_eq!(h.publisher.count("MESSAGE_CREATED"), 1);

        let conversations = ConversationService::new(&h.ctx);
        let stale = conversations.load(conversation.id).await.unwrap();
        assert!(stale.last_message.is_none());

        h.store.set_fail_conversation_updates(false);
        h.send(Actor::customer(id(CUSTOMER)), conversation.id, "again")
            .await;

        let current = conversations.load(conversation.id).await.unwrap();
        let last = current.last_message.unwrap();
        assert_ne!(last.id, message.id);
        assert_eq!(last.preview, "again");
    }

    #[tokio::test]
    async fn test_per_sender_order_is_preserved() {
        let h = harness();
        let conversation = h.open_conversation(id(CUSTOMER), Some(id(AGENT))).await;
        h.publisher.clear();

        for i in 0..20 {
            h.send(Actor::customer(id(CUSTOMER)), conversation.id, &format!("{i}"))
                .await;
        }

        let delivered: Vec<(Snowflake, String)> = h
            .publisher
            .events()
            .into_iter()
            .filter_map(|(_, event)| match event {
                DomainEvent::MessageCreated(m) => Some((m.id, m.content)),
                _ => None,
            })
            .collect();
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(
            delivered.iter().map(|(_, c)| c.clone()).collect::<Vec<_>>(),
            expected
        );
        assert!(delivered.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[tokio::test]
    async fn test_send_and_close_race_never_accepts_after_close() {
        for _ in 0..20 {
            let h = harness();
            let conversation = h.open_conversation(id(CUSTOMER), Some(id(AGENT))).await;
            let ctx = Arc::new(h.ctx.clone());
            h.publisher.clear();

            let sender = {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    let mut accepted = 0;
                    for i in 0..10 {
                        let result = MessageService::new(&ctx)
                            .send(
                                Actor::customer(id(CUSTOMER)),
                                SendMessageRequest::text(Some(conversation.id), format!("{i}")),
                            )
                            .await;
                        match result {
                            Ok(_) => accepted += 1,
                            Err(e) => assert_eq!(e.code(), "TERMINAL_STATE"),
                        }
                        tokio::task::yield_now().await;
                    }
                    accepted
                })
            };
            let closer = {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    ConversationService::new(&ctx)
                        .close(Actor::agent(id(AGENT)), conversation.id)
                        .await
                        .unwrap();
                })
            };

            let accepted = sender.await.unwrap();
            closer.await.unwrap();

            // Every accepted message was broadcast before the close, none after
            let types = h.publisher.event_types();
            let close_at = types
                .iter()
                .position(|t| *t == "CONVERSATION_CLOSED")
                .unwrap();
            assert!(types[close_at + 1..].iter().all(|t| *t != "MESSAGE_CREATED"));
            assert_eq!(types[..close_at].len(), accepted);
            assert_eq!(h.store.message_count(conversation.id), accepted);
        }
    }
}
