//! WebSocket handler
//!
//! Each socket gets three tasks: a reader that dispatches client events one at a time, a
//! writer that drains the outbound channel and owns the sink, and a heartbeat monitor.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use support_service::PresenceService;
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::connection::{new_session_id, Connection};
use crate::events::ServerEvent;
use crate::handlers::MessageDispatcher;
use crate::protocol::{CloseCode, GatewayMessage};
use crate::server::GatewayState;

/// How long the writer gets to flush a close frame during teardown
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Lower bound for the liveness check period
const MIN_CHECK_PERIOD: Duration = Duration::from_millis(50);

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(state, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket) {
    let session_id = new_session_id();

    // Create message channel for outgoing events; a join reserves two slots at once
    let (tx, rx) = mpsc::channel::<ServerEvent>(state.chat_config().outbound_buffer.max(2));
    let connection = state.registry().add_connection(session_id.clone(), tx);

    tracing::info!(session_id = %session_id, "WebSocket connection established");

    let (ws_sink, ws_stream) = socket.split();

    let mut send_task = tokio::spawn(write_loop(ws_sink, rx, Arc::clone(&connection)));
    // Never aborted: an in-flight handler runs to completion after the socket is gone
    let mut recv_task = tokio::spawn(read_loop(
        state.clone(),
        Arc::clone(&connection),
        ws_stream,
    ));
    let mut heartbeat_task = tokio::spawn(heartbeat_monitor(
        Arc::clone(&connection),
        state.chat_config().heartbeat_interval() / 2,
        state.chat_config().heartbeat_timeout(),
    ));

    // Wait for any task to complete
    tokio::select! {
        _ = &mut recv_task => {
            tracing::debug!(session_id = %session_id, "Receive task ended");
        }
        _ = &mut send_task => {
            tracing::debug!(session_id = %session_id, "Send task ended");
        }
        _ = &mut heartbeat_task => {
            tracing::debug!(session_id = %session_id, "Heartbeat task ended");
        }
    }

    heartbeat_task.abort();
    if connection.close_code().is_some() {
        // Let the writer deliver the close frame
        let _ = tokio::time::timeout(CLOSE_GRACE, &mut send_task).await;
    }
    send_task.abort();

    cleanup_connection(&state, &connection).await;
}

/// Read client frames and dispatch them in arrival order
async fn read_loop(
    state: GatewayState,
    connection: Arc<Connection>,
    mut ws_stream: SplitStream<WebSocket>,
) {
    while let Some(frame) = ws_stream.next().await {
        if connection.is_closed() {
            break;
        }

        match frame {
            Ok(Message::Text(text)) => {
                // Any inbound frame proves liveness
                connection.record_heartbeat();
                handle_text_message(&state, &connection, &text).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(
                    session_id = %connection.session_id(),
                    "Binary messages not supported"
                );
                connection.close(CloseCode::DecodeError);
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Pong replies are handled automatically by axum
                connection.record_heartbeat();
            }
            Ok(Message::Close(_)) => {
                tracing::info!(session_id = %connection.session_id(), "Client closed connection");
                break;
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %connection.session_id(),
                    error = %e,
                    "WebSocket error"
                );
                connection.close(CloseCode::UnknownError);
                break;
            }
        }
    }
}

/// Frame queued events and write them to the socket
///
/// Sequence numbers are assigned here, so `s` follows the order frames are written.
async fn write_loop(
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerEvent>,
    connection: Arc<Connection>,
) {
    let mut close_signal = connection.close_signal();

    loop {
        if let Some(code) = connection.close_code() {
            send_close(&mut ws_sink, &connection, code).await;
            break;
        }

        tokio::select! {
            biased;

            changed = close_signal.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                let frame = GatewayMessage::dispatch(
                    event.kind.as_str(),
                    connection.next_sequence(),
                    event.data,
                );

                let json = match frame.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(
                            session_id = %connection.session_id(),
                            event = %event.kind,
                            error = %e,
                            "Failed to serialize frame"
                        );
                        continue;
                    }
                };

                if ws_sink.send(Message::Text(json)).await.is_err() {
                    tracing::warn!(
                        session_id = %connection.session_id(),
                        "Failed to send message to WebSocket"
                    );
                    break;
                }
            }
        }
    }

    let _ = ws_sink.close().await;
}

async fn send_close(
    ws_sink: &mut SplitSink<WebSocket, Message>,
    connection: &Connection,
    code: CloseCode,
) {
    tracing::info!(
        session_id = %connection.session_id(),
        close_code = code.as_u16(),
        reason = code.name(),
        "Closing connection"
    );

    let frame = CloseFrame {
        code: code.as_u16(),
        reason: Cow::Borrowed(code.description()),
    };
    if ws_sink.send(Message::Close(Some(frame))).await.is_err() {
        tracing::debug!(session_id = %connection.session_id(), "Close frame not delivered");
    }
}

/// Close the connection once no frame has arrived within `timeout`
async fn heartbeat_monitor(connection: Arc<Connection>, check_every: Duration, timeout: Duration) {
    let mut check_interval = interval(check_every.max(MIN_CHECK_PERIOD));

    loop {
        check_interval.tick().await;

        let time_since = connection.time_since_heartbeat();
        if time_since > timeout {
            tracing::warn!(
                session_id = %connection.session_id(),
                time_since_ms = time_since.as_millis(),
                "Connection timed out (no heartbeat)"
            );
            connection.close(CloseCode::SessionTimeout);
            break;
        }
    }
}

/// Handle a text message from the client
async fn handle_text_message(state: &GatewayState, connection: &Arc<Connection>, text: &str) {
    let message = match GatewayMessage::from_json(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(
                session_id = %connection.session_id(),
                error = %e,
                "Failed to parse message"
            );
            let event = ServerEvent::error("VALIDATION_ERROR", format!("Malformed frame: {e}"));
            if connection.send(event).await.is_err() {
                tracing::debug!(session_id = %connection.session_id(), "Connection already closed");
            }
            return;
        }
    };

    let event = message.t.clone();
    if let Err(e) = MessageDispatcher::dispatch(state, connection, message).await {
        if e.is_server_error() {
            tracing::warn!(
                session_id = %connection.session_id(),
                event = %event,
                error = %e,
                "Handler error"
            );
        } else {
            tracing::debug!(
                session_id = %connection.session_id(),
                event = %event,
                code = e.code(),
                error = %e,
                "Request rejected"
            );
        }

        if connection.send(e.to_server_event()).await.is_err() {
            tracing::debug!(session_id = %connection.session_id(), "Connection already closed");
        }
    }
}

/// Clean up a connection on disconnect
///
/// Presence only goes offline if this connection still owns the participant's registry
/// entry; a superseded connection leaves its successor alone.
async fn cleanup_connection(state: &GatewayState, connection: &Arc<Connection>) {
    let session_id = connection.session_id();
    tracing::info!(session_id = %session_id, "Cleaning up connection");

    state.registry().remove_connection(session_id);

    let Some(actor) = connection.actor() else {
        return;
    };

    if !state.registry().unregister(actor.user_id, session_id) {
        tracing::debug!(
            session_id = %session_id,
            user_id = %actor.user_id,
            "Connection was superseded; presence unchanged"
        );
        return;
    }

    if let Err(e) = PresenceService::new(state.service_context())
        .disconnected(actor.user_id, actor.role, &connection.rooms())
        .await
    {
        tracing::warn!(
            session_id = %session_id,
            user_id = %actor.user_id,
            error = %e,
            "Failed to record disconnect"
        );
    }
}
