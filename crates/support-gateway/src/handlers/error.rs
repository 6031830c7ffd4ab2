//! Handler error types

use support_service::ServiceError;
use thiserror::Error;

use crate::events::ServerEvent;

/// Handler error type
///
/// Every variant is reported to the originating connection only.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload did not match the event's shape
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Authentication failed; sent as `auth_error`
    #[error("{0}")]
    AuthenticationFailed(String),

    /// Action attempted before a successful handshake
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Already authenticated")]
    AlreadyAuthenticated,

    /// Service error
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Stable code carried by the `error` event
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "VALIDATION_ERROR",
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_ERROR",
            Self::NotAuthenticated => "AUTHORIZATION_ERROR",
            Self::AlreadyAuthenticated => "ALREADY_AUTHENTICATED",
            Self::Service(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Failures on our side rather than the client's
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::Internal(_) => true,
            Self::Service(e) => e.is_server_error(),
            _ => false,
        }
    }

    /// The event reported back to the client
    pub fn to_server_event(&self) -> ServerEvent {
        match self {
            Self::AuthenticationFailed(reason) => ServerEvent::auth_error(reason.clone()),
            Self::Service(ServiceError::Authentication(reason)) => {
                ServerEvent::auth_error(reason.clone())
            }
            _ => ServerEvent::error(self.code(), self.to_string()),
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
