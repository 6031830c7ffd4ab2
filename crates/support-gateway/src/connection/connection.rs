//! Individual WebSocket connection
//!
//! Represents a single WebSocket connection and its state. Outbound events go through a
//! bounded channel drained by the connection's writer task; the writer assigns sequence
//! numbers so that `s` is gapless in the order frames hit the socket.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use support_core::Snowflake;
use support_service::Actor;
use tokio::sync::{mpsc, watch};

use crate::events::ServerEvent;
use crate::protocol::CloseCode;

/// A single WebSocket connection
pub struct Connection {
    /// Unique session ID
    session_id: String,

    /// Authenticated participant (None until `authenticate`)
    actor: RwLock<Option<Actor>>,

    /// Channel to the writer task
    sender: mpsc::Sender<ServerEvent>,

    /// Set once; the writer sends the close frame and stops
    close_tx: watch::Sender<Option<CloseCode>>,

    /// Last sequence number assigned
    sequence: AtomicU64,

    /// Last inbound frame
    last_heartbeat: Mutex<Instant>,

    /// Conversations this connection receives room events for
    rooms: RwLock<HashSet<Snowflake>>,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(session_id: String, sender: mpsc::Sender<ServerEvent>) -> Arc<Self> {
        let (close_tx, _) = watch::channel(None);
        Arc::new(Self {
            session_id,
            actor: RwLock::new(None),
            sender,
            close_tx,
            sequence: AtomicU64::new(0),
            last_heartbeat: Mutex::new(Instant::now()),
            rooms: RwLock::new(HashSet::new()),
            created_at: Instant::now(),
        })
    }

    /// Get the session ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the authenticated participant
    pub fn actor(&self) -> Option<Actor> {
        *self.actor.read()
    }

    pub fn user_id(&self) -> Option<Snowflake> {
        self.actor().map(|a| a.user_id)
    }

    /// Set the participant (on successful authentication)
    pub fn set_actor(&self, actor: Actor) {
        *self.actor.write() = Some(actor);
    }

    pub fn clear_actor(&self) {
        *self.actor.write() = None;
    }

    /// Check if the connection is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.actor.read().is_some()
    }

    /// Get the next sequence number
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Get the current sequence number
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Record an inbound frame
    pub fn record_heartbeat(&self) {
        *self.last_heartbeat.lock() = Instant::now();
    }

    /// Get time since the last inbound frame
    pub fn time_since_heartbeat(&self) -> Duration {
        self.last_heartbeat.lock().elapsed()
    }

    /// Join a conversation room; returns false if already joined
    pub fn join_room(&self, conversation_id: Snowflake) -> bool {
        self.rooms.write().insert(conversation_id)
    }

    /// Leave a conversation room
    pub fn leave_room(&self, conversation_id: Snowflake) -> bool {
        self.rooms.write().remove(&conversation_id)
    }

    pub fn is_in_room(&self, conversation_id: Snowflake) -> bool {
        self.rooms.read().contains(&conversation_id)
    }

    /// Get all joined rooms
    pub fn rooms(&self) -> Vec<Snowflake> {
        self.rooms.read().iter().copied().collect()
    }

    /// Queue a reply, waiting for buffer space
    pub async fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event).await
    }

    /// Hold buffer space for `count` replies, waiting until it is free
    ///
    /// Sending through a permit never waits, so replies can be queued while a
    /// conversation lock is held.
    pub async fn reserve(
        &self,
        count: usize,
    ) -> Result<mpsc::PermitIterator<'_, ServerEvent>, mpsc::error::SendError<()>> {
        self.sender.reserve_many(count).await
    }

    /// Queue a broadcast without waiting (non-blocking)
    pub fn try_send(&self, event: ServerEvent) -> Result<(), mpsc::error::TrySendError<ServerEvent>> {
        self.sender.try_send(event)
    }

    /// Ask the writer to close the socket with `code`
    ///
    /// Only the first code counts. Returns false if a close was already requested.
    pub fn close(&self, code: CloseCode) -> bool {
        self.close_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(code);
            true
        })
    }

    /// The requested close code, if any
    pub fn close_code(&self) -> Option<CloseCode> {
        *self.close_tx.borrow()
    }

    /// Receiver the writer task selects on
    pub fn close_signal(&self) -> watch::Receiver<Option<CloseCode>> {
        self.close_tx.subscribe()
    }

    /// Check if the connection is closing or the writer is gone
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.close_code().is_some()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("actor", &self.actor())
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Generate a new session ID
#[must_use]
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
