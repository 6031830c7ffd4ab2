//! Participant database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for participants table
#[derive(Debug, Clone, FromRow)]
pub struct ParticipantModel {
    pub id: i64,
    pub role: String,
    pub online: bool,
    pub last_seen_at: DateTime<Utc>,
}
