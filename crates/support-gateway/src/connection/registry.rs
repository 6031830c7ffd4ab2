//! Session registry
//!
//! Tracks every live connection and, for authenticated ones, the single connection each
//! participant is reachable on. Uses `DashMap` for concurrent access; nothing here awaits, so
//! the registry doubles as the synchronous [`EventPublisher`] the services broadcast through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use support_core::{DomainEvent, EventPublisher, EventTarget, ParticipantRole, Snowflake};
use support_service::Actor;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc;

use super::Connection;
use crate::events::ServerEvent;
use crate::protocol::CloseCode;

/// Connection counters for `/health/stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub connections: usize,
    pub participants: usize,
    pub agents_online: usize,
    pub customers_online: usize,
    pub total_connections: u64,
    pub superseded: u64,
    pub dropped_events: u64,
}

/// Live connections and participant lookup
#[derive(Default)]
pub struct SessionRegistry {
    /// Every open socket by session ID, authenticated or not
    connections: DashMap<String, Arc<Connection>>,

    /// The current connection of each authenticated participant
    participants: DashMap<Snowflake, Arc<Connection>>,

    total_connections: AtomicU64,
    superseded: AtomicU64,
    dropped_events: AtomicU64,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Track a new socket
    pub fn add_connection(
        &self,
        session_id: String,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Arc<Connection> {
        let connection = Connection::new(session_id.clone(), sender);
        self.connections
            .insert(session_id.clone(), Arc::clone(&connection));
        self.total_connections.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(session_id = %session_id, "Connection added");

        connection
    }

    /// Forget a socket
    pub fn remove_connection(&self, session_id: &str) {
        if self.connections.remove(session_id).is_some() {
            tracing::debug!(session_id = %session_id, "Connection removed");
        }
    }

    /// Bind `connection` to `actor`, replacing any previous connection of that participant
    ///
    /// The replaced connection is told to close with [`CloseCode::SessionReplaced`] and is
    /// returned.
    pub fn register(&self, actor: Actor, connection: &Arc<Connection>) -> Option<Arc<Connection>> {
        connection.set_actor(actor);

        let previous = self
            .participants
            .insert(actor.user_id, Arc::clone(connection))
            .filter(|prev| prev.session_id() != connection.session_id());

        if let Some(prev) = &previous {
            prev.close(CloseCode::SessionReplaced);
            self.superseded.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                user_id = %actor.user_id,
                session_id = %connection.session_id(),
                replaced_session_id = %prev.session_id(),
                "Participant connection replaced"
            );
        }

        tracing::debug!(
            session_id = %connection.session_id(),
            user_id = %actor.user_id,
            role = %actor.role,
            "Connection registered"
        );

        previous
    }

    /// Drop the participant entry if it still points at `session_id`
    ///
    /// Returns false when a newer connection has already taken over.
    pub fn unregister(&self, user_id: Snowflake, session_id: &str) -> bool {
        self.participants
            .remove_if(&user_id, |_, conn| conn.session_id() == session_id)
            .is_some()
    }

    /// The live connection of a participant
    pub fn lookup(&self, user_id: Snowflake) -> Option<Arc<Connection>> {
        self.participants.get(&user_id).map(|c| Arc::clone(c.value()))
    }

    /// Whether `session_id` still owns the participant's entry
    pub fn is_registered(&self, user_id: Snowflake, session_id: &str) -> bool {
        self.participants
            .get(&user_id)
            .is_some_and(|conn| conn.session_id() == session_id)
    }

    pub fn is_online(&self, user_id: Snowflake) -> bool {
        self.participants.contains_key(&user_id)
    }

    /// Send to the members' connections that joined the room; returns the delivered count
    pub fn broadcast_to_room(
        &self,
        conversation_id: Snowflake,
        members: &[Snowflake],
        exclude: Option<Snowflake>,
        event: &ServerEvent,
    ) -> usize {
        members
            .iter()
            .filter(|&&member| Some(member) != exclude)
            .filter_map(|&member| self.lookup(member))
            .filter(|conn| conn.is_in_room(conversation_id))
            .filter(|conn| self.deliver(conn, event.clone()))
            .count()
    }

    /// Send to one participant, ignoring rooms
    pub fn send_to_user(&self, user_id: Snowflake, event: ServerEvent) -> bool {
        self.lookup(user_id)
            .is_some_and(|conn| self.deliver(&conn, event))
    }

    /// Send to every connected participant with `role`
    pub fn send_to_role(
        &self,
        role: ParticipantRole,
        exclude: Option<Snowflake>,
        event: &ServerEvent,
    ) -> usize {
        let targets: Vec<Arc<Connection>> = self
            .participants
            .iter()
            .filter(|entry| Some(*entry.key()) != exclude)
            .filter(|entry| entry.value().actor().is_some_and(|a| a.role == role))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        targets
            .iter()
            .filter(|conn| self.deliver(conn, event.clone()))
            .count()
    }

    /// Queue without waiting; a full buffer drops the event for that connection only
    fn deliver(&self, connection: &Connection, event: ServerEvent) -> bool {
        match connection.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    session_id = %connection.session_id(),
                    event = %event.kind,
                    "Outbound buffer full, event dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(session_id = %connection.session_id(), "Connection already closed");
                false
            }
        }
    }

    /// Get the number of open sockets
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of authenticated participants
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn stats(&self) -> RegistryStats {
        let agents_online = self
            .participants
            .iter()
            .filter(|entry| entry.value().actor().is_some_and(|a| a.is_agent()))
            .count();
        let participants = self.participant_count();

        RegistryStats {
            connections: self.connection_count(),
            participants,
            agents_online,
            customers_online: participants.saturating_sub(agents_online),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
        }
    }
}

impl EventPublisher for SessionRegistry {
    fn publish(&self, target: EventTarget, event: DomainEvent) {
        let event = ServerEvent::from(&event);
        let delivered = match target {
            EventTarget::Room {
                conversation_id,
                customer_id,
                agent_id,
                exclude,
            } => {
                let mut members = vec![customer_id];
                members.extend(agent_id);
                self.broadcast_to_room(conversation_id, &members, exclude, &event)
            }
            EventTarget::Role { role, exclude } => self.send_to_role(role, exclude, &event),
            EventTarget::Users(users) => users
                .into_iter()
                .filter(|&user| self.send_to_user(user, event.clone()))
                .count(),
        };

        tracing::trace!(event = %event.kind, delivered, "Event published");
    }

    fn join_room(&self, user_id: Snowflake, conversation_id: Snowflake) -> bool {
        match self.lookup(user_id) {
            Some(conn) => {
                if conn.join_room(conversation_id) {
                    tracing::debug!(
                        session_id = %conn.session_id(),
                        user_id = %user_id,
                        conversation_id = %conversation_id,
                        "Joined room"
                    );
                }
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("connections", &self.connections.len())
            .field("participants", &self.participants.len())
            .finish_non_exhaustive()
    }
}
