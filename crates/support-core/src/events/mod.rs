//! Domain events emitted after state changes are persisted

mod domain_event;

pub use domain_event::{
    AgentJoinedEvent, ConversationClosedEvent, DomainEvent, EventTarget, MessagesReadEvent,
    PresenceEvent, TypingEvent,
};
