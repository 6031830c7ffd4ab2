//! JWT validation for the chat handshake
//!
//! Tokens are issued by the storefront's auth service. The gateway checks the signature and
//! expiry, then that the token was issued for the identity and role the client claims.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use support_core::{ParticipantRole, Snowflake};

use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (participant ID)
    pub sub: String,
    /// Role the token was issued for
    pub role: ParticipantRole,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Get the participant ID as a Snowflake
    ///
    /// # Errors
    /// Returns an error if the subject cannot be parsed as a Snowflake
    pub fn user_id(&self) -> Result<Snowflake, AppError> {
        Snowflake::parse(&self.sub).map_err(|_| AppError::InvalidToken)
    }

    /// Check if the token is expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// JWT service for encoding and decoding tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry: i64,
}

impl JwtService {
    /// Create a new JWT service with the given secret and expiry (seconds)
    #[must_use]
    pub fn new(secret: &str, access_token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry,
        }
    }

    /// Mint a token for a participant
    ///
    /// Production tokens come from the auth service; this is used by tooling and tests that
    /// share the secret.
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn generate_token(&self, user_id: Snowflake, role: ParticipantRole) -> Result<String, AppError> {
        self.generate_token_with_expiry(user_id, role, self.access_token_expiry)
    }

    /// Mint a token with an explicit lifetime in seconds (negative for already expired)
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn generate_token_with_expiry(
        &self,
        user_id: Snowflake,
        role: ParticipantRole,
        expiry_secs: i64,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to encode JWT")))
    }

    /// Decode and validate a JWT token
    ///
    /// # Errors
    /// Returns an error if the token is invalid or expired
    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            }
        })?;

        Ok(token_data.claims)
    }

    /// Validate a token against the identity a client claims in its handshake
    ///
    /// # Errors
    /// Returns an error if the token is invalid, expired, or issued for another participant
    /// or role
    pub fn verify_participant(
        &self,
        token: &str,
        user_id: Snowflake,
        role: ParticipantRole,
    ) -> Result<Claims, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::MissingAuth);
        }

        let claims = self.decode_token(token)?;
        if claims.user_id()? != user_id || claims.role != role {
            return Err(AppError::InvalidCredentials);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("access_token_expiry", &self.access_token_expiry)
            .finish_non_exhaustive()
    }
}
