//! `typing_start` / `typing_stop` handlers

use support_service::{Actor, ConversationRef, TypingService};

use super::HandlerResult;
use crate::server::GatewayState;

/// Handles typing indicators
pub struct TypingHandler;

impl TypingHandler {
    pub async fn start(
        state: &GatewayState,
        actor: Actor,
        request: ConversationRef,
    ) -> HandlerResult<()> {
        TypingService::new(state.service_context())
            .start(actor, request.conversation_id)
            .await?;
        Ok(())
    }

    pub async fn stop(
        state: &GatewayState,
        actor: Actor,
        request: ConversationRef,
    ) -> HandlerResult<()> {
        TypingService::new(state.service_context())
            .stop(actor, request.conversation_id)
            .await?;
        Ok(())
    }
}
