//! Data transfer objects
//!
//! Request payloads are deserialized straight from client frames (camelCase) and validated
//! before reaching a service; responses are what services hand back to the gateway.

pub mod requests;
pub mod responses;

pub use requests::{
    Actor, AssignRequest, ConversationRef, HistoryRequest, ListConversationsRequest,
    SendMessageRequest,
};
pub use responses::{CloseOutcome, JoinedConversation};
