//! Client event handlers
//!
//! Handles incoming WebSocket messages based on their event name.

mod authenticate;
mod conversation;
mod error;
mod heartbeat;
mod message;
mod typing;

pub use authenticate::AuthenticateHandler;
pub use conversation::ConversationHandler;
pub use error::{HandlerError, HandlerResult};
pub use heartbeat::HeartbeatHandler;
pub use message::MessageHandler;
pub use typing::TypingHandler;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use support_service::{Actor, JoinedConversation};
use tokio::sync::mpsc::PermitIterator;

use crate::connection::Connection;
use crate::events::{ClientEventType, ServerEvent};
use crate::protocol::GatewayMessage;
use crate::server::GatewayState;

/// Dispatch incoming client messages to appropriate handlers
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle an incoming client message
    ///
    /// Errors are for the originating connection only; the caller turns them into an
    /// `error` or `auth_error` event.
    pub async fn dispatch(
        state: &GatewayState,
        connection: &Arc<Connection>,
        message: GatewayMessage,
    ) -> HandlerResult<()> {
        let event = ClientEventType::from_name(&message.t)
            .ok_or_else(|| HandlerError::UnknownEvent(message.t.clone()))?;

        tracing::trace!(
            session_id = %connection.session_id(),
            event = %event,
            "Dispatching client event"
        );

        if !event.allowed_unauthenticated() && !connection.is_authenticated() {
            return Err(HandlerError::NotAuthenticated);
        }

        match event {
            ClientEventType::Authenticate => {
                AuthenticateHandler::handle(state, connection, parse(&message)?).await
            }
            ClientEventType::Heartbeat => HeartbeatHandler::handle(connection).await,
            ClientEventType::JoinConversation => {
                let actor = require_actor(connection)?;
                ConversationHandler::join(state, connection, actor, parse(&message)?).await
            }
            ClientEventType::LeaveConversation => {
                require_actor(connection)?;
                ConversationHandler::leave(connection, parse(&message)?);
                Ok(())
            }
            ClientEventType::SendMessage => {
                let actor = require_actor(connection)?;
                MessageHandler::send(state, connection, actor, parse(&message)?).await
            }
            ClientEventType::TypingStart => {
                let actor = require_actor(connection)?;
                TypingHandler::start(state, actor, parse(&message)?).await
            }
            ClientEventType::TypingStop => {
                let actor = require_actor(connection)?;
                TypingHandler::stop(state, actor, parse(&message)?).await
            }
            ClientEventType::AssignConversation => {
                let actor = require_actor(connection)?;
                ConversationHandler::assign(state, actor, parse(&message)?).await
            }
            ClientEventType::CloseConversation => {
                let actor = require_actor(connection)?;
                ConversationHandler::close(state, connection, actor, parse(&message)?).await
            }
            ClientEventType::MarkRead => {
                let actor = require_actor(connection)?;
                ConversationHandler::mark_read(state, actor, parse(&message)?).await
            }
            ClientEventType::ListConversations => {
                let actor = require_actor(connection)?;
                ConversationHandler::list(state, connection, actor, parse(&message)?).await
            }
        }
    }
}

fn require_actor(connection: &Connection) -> HandlerResult<Actor> {
    connection.actor().ok_or(HandlerError::NotAuthenticated)
}

fn parse<T: DeserializeOwned>(message: &GatewayMessage) -> HandlerResult<T> {
    message
        .payload()
        .map_err(|e| HandlerError::InvalidPayload(format!("{}: {e}", message.t)))
}

/// Queue a reply on the caller's own connection
pub(crate) async fn reply(connection: &Connection, event: ServerEvent) -> HandlerResult<()> {
    connection.send(event).await.map_err(|e| {
        HandlerError::Internal(format!("Failed to send {}: connection closed", e.0.kind))
    })
}

/// Hold space for the `joined_conversation` and `message_history` replies of a join
pub(crate) async fn reserve_join_replies(
    connection: &Connection,
) -> HandlerResult<PermitIterator<'_, ServerEvent>> {
    connection.reserve(2).await.map_err(|_| {
        HandlerError::Internal("Failed to reserve join replies: connection closed".to_string())
    })
}

/// Queue `joined_conversation` then `message_history` through held permits
pub(crate) fn queue_join_replies(
    permits: PermitIterator<'_, ServerEvent>,
    joined: &JoinedConversation,
) {
    let events = [
        ServerEvent::joined_conversation(&joined.conversation),
        ServerEvent::message_history(joined.conversation.id, &joined.history),
    ];
    for (permit, event) in permits.zip(events) {
        permit.send(event);
    }
}
