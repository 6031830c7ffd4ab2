//! `heartbeat` handler

use super::{reply, HandlerResult};
use crate::connection::Connection;
use crate::events::ServerEvent;

/// Handles heartbeat messages
pub struct HeartbeatHandler;

impl HeartbeatHandler {
    /// Refresh liveness and acknowledge
    pub async fn handle(connection: &Connection) -> HandlerResult<()> {
        connection.record_heartbeat();

        tracing::trace!(
            session_id = %connection.session_id(),
            server_seq = connection.current_sequence(),
            "Heartbeat received"
        );

        reply(connection, ServerEvent::heartbeat_ack()).await
    }
}
