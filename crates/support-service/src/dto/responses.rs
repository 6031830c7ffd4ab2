//! Results handed back to the gateway

use support_core::{Conversation, HistoryPage};

/// A conversation the caller just joined, with the requested history page
#[derive(Debug, Clone)]
pub struct JoinedConversation {
    pub conversation: Conversation,
    pub history: HistoryPage,
}

/// Result of a close request
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub conversation: Conversation,
    /// False when the conversation was already closed
    pub changed: bool,
}
