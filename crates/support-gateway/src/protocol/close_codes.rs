//! WebSocket close codes
//!
//! Gateway-specific close codes sent when the server ends a connection.

use serde::{Deserialize, Serialize};

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred
    UnknownError = 4000,
    /// Frame could not be decoded (binary frames are not supported)
    DecodeError = 4002,
    /// No heartbeat within the timeout
    SessionTimeout = 4009,
    /// The participant connected again elsewhere
    SessionReplaced = 4010,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4002 => Some(Self::DecodeError),
            4009 => Some(Self::SessionTimeout),
            4010 => Some(Self::SessionReplaced),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the client should attempt to reconnect after this close code
    ///
    /// A replaced session must not reconnect, or two clients would evict each other forever.
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(self, Self::SessionReplaced)
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::DecodeError => "Invalid payload encoding",
            Self::SessionTimeout => "Session timeout",
            Self::SessionReplaced => "Session replaced by a newer connection",
        }
    }

    /// Get the name of this close code
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnknownError => "UnknownError",
            Self::DecodeError => "DecodeError",
            Self::SessionTimeout => "SessionTimeout",
            Self::SessionReplaced => "SessionReplaced",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
