//! Event publisher port - fan-out of domain events to live connections
//!
//! The service layer publishes through this trait only, so a pub/sub backed implementation
//! can replace the in-process session registry without touching services.

use crate::events::{DomainEvent, EventTarget};
use crate::value_objects::Snowflake;

/// Fire-and-forget delivery of domain events
///
/// Implementations must not block on slow recipients: `publish` is called while the
/// conversation lock is held.
pub trait EventPublisher: Send + Sync {
    /// Deliver `event` to every live connection selected by `target`
    fn publish(&self, target: EventTarget, event: DomainEvent);

    /// Add `conversation_id` to the rooms joined by `user_id`'s live connection
    ///
    /// Returns false if the participant has no live connection.
    fn join_room(&self, user_id: Snowflake, conversation_id: Snowflake) -> bool;
}

/// Publisher that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _target: EventTarget, _event: DomainEvent) {}

    fn join_room(&self, _user_id: Snowflake, _conversation_id: Snowflake) -> bool {
        false
    }
}
