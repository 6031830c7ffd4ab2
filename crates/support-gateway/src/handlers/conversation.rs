//! Conversation lifecycle handlers

use std::sync::Arc;

use support_service::{
    Actor, AssignRequest, ConversationRef, ConversationService, HistoryRequest,
    ListConversationsRequest,
};

use super::{queue_join_replies, reply, reserve_join_replies, HandlerResult};
use crate::connection::Connection;
use crate::events::ServerEvent;
use crate::server::GatewayState;

/// Handles join, leave, assign, close, read marks and the agent dashboard list
pub struct ConversationHandler;

impl ConversationHandler {
    /// `join_conversation`: replies `joined_conversation` then `message_history`
    ///
    /// Both replies are queued before the connection joins the room, so live messages
    /// always follow the history page.
    pub async fn join(
        state: &GatewayState,
        connection: &Arc<Connection>,
        actor: Actor,
        request: HistoryRequest,
    ) -> HandlerResult<()> {
        let permits = reserve_join_replies(connection).await?;
        ConversationService::new(state.service_context())
            .join(actor, request, |joined| queue_join_replies(permits, joined))
            .await?;
        Ok(())
    }

    /// `leave_conversation`: stop receiving room events on this connection
    pub fn leave(connection: &Connection, request: ConversationRef) {
        if connection.leave_room(request.conversation_id) {
            tracing::debug!(
                session_id = %connection.session_id(),
                conversation_id = %request.conversation_id,
                "Left room"
            );
        }
    }

    /// `assign_conversation`: the room, now including the agent, hears `admin_joined`
    pub async fn assign(
        state: &GatewayState,
        actor: Actor,
        request: AssignRequest,
    ) -> HandlerResult<()> {
        ConversationService::new(state.service_context())
            .assign(actor, request)
            .await?;
        Ok(())
    }

    /// `close_conversation`: the caller always gets `conversation_closed`, the rest of the
    /// room only when the conversation actually changed
    pub async fn close(
        state: &GatewayState,
        connection: &Arc<Connection>,
        actor: Actor,
        request: ConversationRef,
    ) -> HandlerResult<()> {
        let outcome = ConversationService::new(state.service_context())
            .close(actor, request.conversation_id)
            .await?;

        let conversation = &outcome.conversation;
        let closed_at = conversation.closed_at.unwrap_or(conversation.updated_at);
        reply(
            connection,
            ServerEvent::conversation_closed(conversation.id, actor.user_id, closed_at),
        )
        .await
    }

    /// `mark_read`: the other side hears `messages_read` if anything changed
    pub async fn mark_read(
        state: &GatewayState,
        actor: Actor,
        request: ConversationRef,
    ) -> HandlerResult<()> {
        ConversationService::new(state.service_context())
            .mark_read(actor, request.conversation_id)
            .await?;
        Ok(())
    }

    /// `list_conversations`
    pub async fn list(
        state: &GatewayState,
        connection: &Arc<Connection>,
        actor: Actor,
        request: ListConversationsRequest,
    ) -> HandlerResult<()> {
        let conversations = ConversationService::new(state.service_context())
            .list(actor, request)
            .await?;
        reply(connection, ServerEvent::conversation_list(conversations)).await
    }
}
