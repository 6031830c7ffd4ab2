//! Service layer error types
//!
//! Every failure a client can observe is one of these variants; the gateway turns them into
//! an `error` event addressed to the originating connection only.

use support_common::AppError;
use support_core::DomainError;
use thiserror::Error;

/// Service layer result type
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service layer errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Credentials missing, malformed, expired or not matching the claimed identity
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authenticated, but not allowed to act on this conversation
    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// The conversation is closed
    #[error("{0}")]
    TerminalState(String),

    /// The store rejected or failed a write
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::TerminalState(_) => "TERMINAL_STATE",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure is the server's fault rather than the client's
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Internal(_))
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::ConversationNotFound(id) => Self::not_found("Conversation", id.to_string()),
            DomainError::MessageNotFound(id) => Self::not_found("Message", id.to_string()),
            DomainError::ParticipantNotFound(id) => Self::not_found("Participant", id.to_string()),
            e if e.is_authorization() => Self::Authorization(e.to_string()),
            e if e.is_terminal() => Self::TerminalState(e.to_string()),
            e if e.is_validation() => Self::Validation(e.to_string()),
            e if e.is_persistence() => Self::Persistence(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<AppError> for ServiceError {
    fn from(err: AppError) -> Self {
        match err {
            e if e.is_auth_error() => Self::Authentication(e.to_string()),
            AppError::Validation(message) => Self::Validation(message),
            AppError::Database(message) => Self::Persistence(message),
            AppError::Domain(e) => e.into(),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: {}", e.code),
                })
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self::Validation(message)
    }
}
