//! `authenticate` handler

use std::sync::Arc;

use support_service::{Actor, ConversationService, PresenceService};

use super::{queue_join_replies, reply, reserve_join_replies, HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::events::{AuthenticatePayload, ServerEvent};
use crate::server::GatewayState;

/// Handles the handshake
pub struct AuthenticateHandler;

impl AuthenticateHandler {
    /// Verify the claimed identity, register the connection and bring a customer back into
    /// their open conversation
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: AuthenticatePayload,
    ) -> HandlerResult<()> {
        if connection.is_authenticated() {
            tracing::warn!(
                session_id = %connection.session_id(),
                "Client sent authenticate while already authenticated"
            );
            return Err(HandlerError::AlreadyAuthenticated);
        }

        // Extract token (remove "Bearer " prefix if present)
        let token = payload
            .token
            .strip_prefix("Bearer ")
            .unwrap_or(&payload.token);

        state
            .service_context()
            .jwt_service()
            .verify_participant(token, payload.user_id, payload.user_type)
            .map_err(|e| {
                tracing::debug!(
                    session_id = %connection.session_id(),
                    user_id = %payload.user_id,
                    error = %e,
                    "Token validation failed"
                );
                HandlerError::AuthenticationFailed(e.to_string())
            })?;

        let actor = Actor::new(payload.user_id, payload.user_type);
        state.registry().register(actor, connection);

        let ctx = state.service_context();
        if let Err(e) = PresenceService::new(ctx)
            .connected(actor.user_id, actor.role)
            .await
        {
            state
                .registry()
                .unregister(actor.user_id, connection.session_id());
            connection.clear_actor();
            return Err(e.into());
        }

        if !Self::still_registered(state, connection, actor).await {
            return Ok(());
        }

        reply(connection, ServerEvent::authenticated(actor.user_id, actor.role)).await?;

        tracing::info!(
            session_id = %connection.session_id(),
            user_id = %actor.user_id,
            role = %actor.role,
            "Connection authenticated"
        );

        if actor.is_agent() {
            return Ok(());
        }

        let permits = reserve_join_replies(connection).await?;
        let resumed = ConversationService::new(ctx)
            .resume(actor.user_id, |joined| queue_join_replies(permits, joined))
            .await?;

        if let Some(joined) = resumed {
            tracing::debug!(
                session_id = %connection.session_id(),
                conversation_id = %joined.conversation.id,
                "Customer rejoined open conversation"
            );
        }

        Ok(())
    }

    /// Check that the connection survived the presence write
    ///
    /// The socket can be torn down while `connected` is in flight. Cleanup then marks the
    /// participant offline before the online write lands, so the offline state is written
    /// again unless a newer connection has taken over.
    async fn still_registered(
        state: &GatewayState,
        connection: &Connection,
        actor: Actor,
    ) -> bool {
        let registry = state.registry();
        if registry.is_registered(actor.user_id, connection.session_id()) {
            return true;
        }

        tracing::debug!(
            session_id = %connection.session_id(),
            user_id = %actor.user_id,
            "Connection closed during authentication"
        );

        if !registry.is_online(actor.user_id) {
            if let Err(e) = PresenceService::new(state.service_context())
                .disconnected(actor.user_id, actor.role, &[])
                .await
            {
                tracing::warn!(
                    user_id = %actor.user_id,
                    error = %e,
                    "Failed to restore offline presence"
                );
            }
        }
        false
    }
}
