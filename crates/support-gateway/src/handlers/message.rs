//! `send_message` handler

use std::sync::Arc;

use support_service::{Actor, MessageService, SendMessageRequest};

use super::{reply, HandlerResult};
use crate::connection::Connection;
use crate::events::ServerEvent;
use crate::server::GatewayState;

/// Handles message sends
pub struct MessageHandler;

impl MessageHandler {
    pub async fn send(
        state: &GatewayState,
        connection: &Arc<Connection>,
        actor: Actor,
        request: SendMessageRequest,
    ) -> HandlerResult<()> {
        let message = MessageService::new(state.service_context())
            .send(actor, request)
            .await?;

        // The room broadcast already echoed it unless this connection never joined
        if !connection.is_in_room(message.conversation_id) {
            reply(connection, ServerEvent::new_message(&message)).await?;
        }

        Ok(())
    }
}
