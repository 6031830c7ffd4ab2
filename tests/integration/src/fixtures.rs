//! Test fixtures and payload builders
//!
//! Provides reusable test data for integration tests.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::Deserialize;
use serde_json::{json, Value};
use support_core::{ParticipantRole, Snowflake};

/// Counter for unique participant IDs
static COUNTER: AtomicI64 = AtomicI64::new(1_000);

/// Get a unique participant ID
pub fn unique_user_id() -> Snowflake {
    Snowflake::new(COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// A server frame
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub t: String,
    pub s: u64,
    #[serde(default)]
    pub d: Value,
}

impl Frame {
    /// `conversationId` of the payload
    pub fn conversation_id(&self) -> Option<Snowflake> {
        self.d["conversationId"].as_str()?.parse().ok()
    }

    /// Contents of a `message_history` payload, oldest first
    pub fn history_contents(&self) -> Vec<String> {
        self.d["messages"]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m["content"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn authenticate(user_id: Snowflake, role: ParticipantRole, token: &str) -> Value {
    json!({
        "userId": user_id.to_string(),
        "userType": role,
        "token": token,
    })
}

pub fn send_message(conversation_id: Option<Snowflake>, content: &str) -> Value {
    match conversation_id {
        Some(id) => json!({ "conversationId": id.to_string(), "content": content }),
        None => json!({ "content": content }),
    }
}

/// Payload of the events that only name a conversation
pub fn conversation(conversation_id: Snowflake) -> Value {
    json!({ "conversationId": conversation_id.to_string() })
}

pub fn assign(conversation_id: Snowflake, agent_id: Snowflake) -> Value {
    json!({
        "conversationId": conversation_id.to_string(),
        "adminId": agent_id.to_string(),
    })
}
