//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Conversation not found: {0}")]
    ConversationNotFound(Snowflake),

    #[error("Message not found: {0}")]
    MessageNotFound(Snowflake),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(Snowflake),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Content too long: max {max} characters")]
    ContentTooLong { max: usize },

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("User {user_id} is not a participant of conversation {conversation_id}")]
    NotConversationMember {
        conversation_id: Snowflake,
        user_id: Snowflake,
    },

    #[error("Only agents can {0}")]
    AgentRequired(&'static str),

    // =========================================================================
    // State Errors
    // =========================================================================
    #[error("Conversation {0} is closed")]
    ConversationClosed(Snowflake),

    #[error("Customer {0} already has an open conversation")]
    OpenConversationExists(Snowflake),

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for wire responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConversationNotFound(_) => "UNKNOWN_CONVERSATION",
            Self::MessageNotFound(_) => "UNKNOWN_MESSAGE",
            Self::ParticipantNotFound(_) => "UNKNOWN_PARTICIPANT",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::ContentTooLong { .. } => "CONTENT_TOO_LONG",
            Self::NotConversationMember { .. } => "NOT_CONVERSATION_MEMBER",
            Self::AgentRequired(_) => "AGENT_REQUIRED",
            Self::ConversationClosed(_) => "CONVERSATION_CLOSED",
            Self::OpenConversationExists(_) => "OPEN_CONVERSATION_EXISTS",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_) | Self::MessageNotFound(_) | Self::ParticipantNotFound(_)
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_) | Self::ContentTooLong { .. })
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::NotConversationMember { .. } | Self::AgentRequired(_))
    }

    /// Action attempted on a closed conversation
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ConversationClosed(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::OpenConversationExists(_))
    }

    /// Failure of the storage layer rather than of a domain rule
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::DatabaseError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DomainError::ConversationNotFound(Snowflake::new(1));
        assert_eq!(err.code(), "UNKNOWN_CONVERSATION");
        assert_eq!(
            DomainError::ConversationClosed(Snowflake::new(1)).code(),
            "CONVERSATION_CLOSED"
        );
    }

    #[test]
    fn test_classification() {
        assert!(DomainError::ConversationNotFound(Snowflake::new(1)).is_not_found());
        assert!(DomainError::ConversationClosed(Snowflake::new(1)).is_terminal());
        assert!(DomainError::AgentRequired("assign conversations").is_authorization());
        assert!(DomainError::DatabaseError("timeout".into()).is_persistence());
        assert!(!DomainError::DatabaseError("timeout".into()).is_not_found());
        assert!(DomainError::OpenConversationExists(Snowflake::new(2)).is_conflict());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::NotConversationMember {
            conversation_id: Snowflake::new(5),
            user_id: Snowflake::new(9),
        };
        assert_eq!(
            err.to_string(),
            "User 9 is not a participant of conversation 5"
        );

        let err = DomainError::ContentTooLong { max: 2000 };
        assert_eq!(err.to_string(), "Content too long: max 2000 characters");
    }
}
