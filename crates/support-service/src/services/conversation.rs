//! Conversation service
//!
//! Drives the conversation state machine. Every state change happens under the
//! conversation's lock, is persisted first and only then published.

use chrono::Utc;
use support_core::entities::Assignment;
use support_core::events::{AgentJoinedEvent, ConversationClosedEvent, MessagesReadEvent};
use support_core::traits::HistoryQuery;
use support_core::{Conversation, DomainError, DomainEvent, EventTarget, Snowflake};
use tracing::{info, instrument};
use validator::Validate;

use crate::dto::{
    Actor, AssignRequest, CloseOutcome, HistoryRequest, JoinedConversation,
    ListConversationsRequest,
};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Conversation service
pub struct ConversationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ConversationService<'a> {
    /// Create a new ConversationService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load a conversation or fail with NotFound
    pub async fn load(&self, conversation_id: Snowflake) -> ServiceResult<Conversation> {
        self.ctx
            .conversation_repo()
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Conversation", conversation_id.to_string()))
    }

    /// The customer's open conversation, started if there is none
    ///
    /// Serialized per customer so concurrent first messages agree on one conversation.
    /// The customer's connection is joined to the room either way.
    #[instrument(skip(self))]
    pub async fn find_or_start(&self, customer_id: Snowflake) -> ServiceResult<Conversation> {
        let _guard = self.ctx.customer_locks().lock(customer_id).await;

        let repo = self.ctx.conversation_repo();
        if let Some(existing) = repo.find_open_by_customer(customer_id).await? {
            self.ctx.publisher().join_room(customer_id, existing.id);
            return Ok(existing);
        }

        let conversation = Conversation::start(self.ctx.generate_id(), customer_id);
        match repo.create(&conversation).await {
            Ok(()) => {}
            // Another gateway process won the race; use its conversation
            Err(e) if e.is_conflict() => {
                let existing = repo.find_open_by_customer(customer_id).await?.ok_or_else(|| {
                    ServiceError::internal("open conversation disappeared after a conflict")
                })?;
                self.ctx.publisher().join_room(customer_id, existing.id);
                return Ok(existing);
            }
            Err(e) => return Err(e.into()),
        }

        info!(conversation_id = %conversation.id, customer_id = %customer_id, "Conversation started");

        self.ctx.publisher().join_room(customer_id, conversation.id);
        self.ctx.publisher().publish(
            EventTarget::agents(),
            DomainEvent::ConversationCreated(Box::new(conversation.clone())),
        );

        Ok(conversation)
    }

    /// Assign the calling agent
    ///
    /// Agents assign themselves only. Reassigning an active conversation moves it to the
    /// caller; the previous agent is told and drops out of the room.
    #[instrument(skip(self))]
    pub async fn assign(&self, actor: Actor, request: AssignRequest) -> ServiceResult<Conversation> {
        if !actor.is_agent() {
            return Err(DomainError::AgentRequired("assign conversations").into());
        }
        if request.admin_id != actor.user_id {
            return Err(ServiceError::authorization(
                "Agents can only assign conversations to themselves",
            ));
        }

        let _guard = self.ctx.conversation_locks().lock(request.conversation_id).await;
        let mut conversation = self.load(request.conversation_id).await?;

        let outcome = conversation.assign(actor.user_id)?;
        if outcome != Assignment::Unchanged {
            self.ctx.conversation_repo().update(&conversation).await?;
        }

        let previous_agent_id = match outcome {
            Assignment::Reassigned { previous } => Some(previous),
            Assignment::Activated | Assignment::Unchanged => None,
        };

        info!(
            conversation_id = %conversation.id,
            agent_id = %actor.user_id,
            previous_agent_id = ?previous_agent_id,
            "Conversation assigned"
        );

        self.ctx.publisher().join_room(actor.user_id, conversation.id);

        let event = DomainEvent::AgentJoined(AgentJoinedEvent {
            conversation_id: conversation.id,
            agent_id: actor.user_id,
            previous_agent_id,
        });
        if let Some(previous) = previous_agent_id {
            self.ctx
                .publisher()
                .publish(EventTarget::Users(vec![previous]), event.clone());
        }
        self.ctx
            .publisher()
            .publish(EventTarget::room(&conversation), event);

        Ok(conversation)
    }

    /// Join the room, mark the caller's unread messages read and load a history page
    ///
    /// `deliver` runs under the conversation lock, before the caller joins the room: the
    /// history it hands on is queued ahead of any message sent after it was read. Closed
    /// conversations can be joined to read their history.
    #[instrument(skip(self, request, deliver), fields(conversation_id = %request.conversation_id))]
    pub async fn join<F>(
        &self,
        actor: Actor,
        request: HistoryRequest,
        deliver: F,
    ) -> ServiceResult<JoinedConversation>
    where
        F: FnOnce(&JoinedConversation),
    {
        request.validate()?;

        let _guard = self.ctx.conversation_locks().lock(request.conversation_id).await;
        let mut conversation = self.load(request.conversation_id).await?;
        conversation.ensure_member(actor.user_id)?;

        self.mark_read_locked(actor.user_id, &mut conversation)
            .await?;

        let limit = request
            .limit
            .unwrap_or(self.ctx.chat_config().history_page_size);
        let history = self
            .ctx
            .message_repo()
            .find_by_conversation(
                conversation.id,
                HistoryQuery::new(request.before, Some(limit)),
            )
            .await?;

        let joined = JoinedConversation {
            conversation,
            history,
        };
        deliver(&joined);

        self.ctx
            .publisher()
            .join_room(actor.user_id, joined.conversation.id);

        info!(
            user_id = %actor.user_id,
            messages = joined.history.messages.len(),
            has_more = joined.history.has_more,
            "Conversation joined"
        );

        Ok(joined)
    }

    /// Rejoin the customer's open conversation after (re)connecting
    #[instrument(skip(self, deliver))]
    pub async fn resume<F>(
        &self,
        customer_id: Snowflake,
        deliver: F,
    ) -> ServiceResult<Option<JoinedConversation>>
    where
        F: FnOnce(&JoinedConversation),
    {
        let Some(open) = self
            .ctx
            .conversation_repo()
            .find_open_by_customer(customer_id)
            .await?
        else {
            return Ok(None);
        };

        self.join(
            Actor::customer(customer_id),
            HistoryRequest::latest(open.id),
            deliver,
        )
        .await
        .map(Some)
    }

    /// Close a conversation
    ///
    /// Any agent or the conversation's customer may close. Closing twice is not an error;
    /// the outcome reports whether anything changed. The broadcast skips the caller.
    #[instrument(skip(self))]
    pub async fn close(&self, actor: Actor, conversation_id: Snowflake) -> ServiceResult<CloseOutcome> {
        let _guard = self.ctx.conversation_locks().lock(conversation_id).await;
        let mut conversation = self.load(conversation_id).await?;

        if !actor.is_agent() {
            conversation.ensure_member(actor.user_id)?;
        }

        if !conversation.close() {
            return Ok(CloseOutcome {
                conversation,
                changed: false,
            });
        }

        self.ctx.conversation_repo().update(&conversation).await?;

        info!(conversation_id = %conversation.id, closed_by = %actor.user_id, "Conversation closed");

        let closed_at = conversation.closed_at.unwrap_or(conversation.updated_at);
        self.ctx.publisher().publish(
            EventTarget::room_except(&conversation, actor.user_id),
            DomainEvent::ConversationClosed(ConversationClosedEvent {
                conversation_id: conversation.id,
                closed_by: actor.user_id,
                closed_at,
            }),
        );

        Ok(CloseOutcome {
            conversation,
            changed: true,
        })
    }

    /// Mark everything the caller has not sent as read; returns the number of messages changed
    #[instrument(skip(self))]
    pub async fn mark_read(&self, actor: Actor, conversation_id: Snowflake) -> ServiceResult<u64> {
        let _guard = self.ctx.conversation_locks().lock(conversation_id).await;
        let mut conversation = self.load(conversation_id).await?;
        conversation.ensure_member(actor.user_id)?;

        self.mark_read_locked(actor.user_id, &mut conversation).await
    }

    /// Conversations visible on the agent dashboard
    ///
    /// Without a status filter this is every open conversation.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        actor: Actor,
        request: ListConversationsRequest,
    ) -> ServiceResult<Vec<Conversation>> {
        if !actor.is_agent() {
            return Err(DomainError::AgentRequired("list conversations").into());
        }

        let repo = self.ctx.conversation_repo();
        let conversations = match request.status {
            Some(status) => repo.list_by_status(status).await?,
            None => repo.list_active().await?,
        };
        Ok(conversations)
    }

    /// Caller must hold the conversation lock
    async fn mark_read_locked(
        &self,
        reader_id: Snowflake,
        conversation: &mut Conversation,
    ) -> ServiceResult<u64> {
        let read_at = Utc::now();
        let count = self
            .ctx
            .message_repo()
            .mark_read(conversation.id, reader_id, read_at)
            .await?;

        if conversation.unread_for(reader_id) > 0 {
            conversation.clear_unread(reader_id);
            self.ctx.conversation_repo().update(conversation).await?;
        }

        if count > 0 {
            self.ctx.publisher().publish(
                EventTarget::room_except(conversation, reader_id),
                DomainEvent::MessagesRead(MessagesReadEvent {
                    conversation_id: conversation.id,
                    reader_id,
                    count,
                    read_at,
                }),
            );
        }

        Ok(count)
    }
}
