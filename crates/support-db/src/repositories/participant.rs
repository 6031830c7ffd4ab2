//! PostgreSQL implementation of ParticipantRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use support_core::entities::Participant;
use support_core::traits::{ParticipantRepository, RepoResult};
use support_core::value_objects::Snowflake;

use crate::models::ParticipantModel;

use super::error::{map_db_error, participant_not_found};

/// PostgreSQL implementation of ParticipantRepository
#[derive(Clone)]
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    /// Create a new PgParticipantRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    #[instrument(skip(self, participant), fields(user_id = %participant.id))]
    async fn upsert(&self, participant: &Participant) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO participants (id, role, online, last_seen_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET role = EXCLUDED.role,
                online = EXCLUDED.online,
                last_seen_at = EXCLUDED.last_seen_at
            ",
        )
        .bind(participant.id.into_inner())
        .bind(participant.role.as_str())
        .bind(participant.online)
        .bind(participant.last_seen_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Participant>> {
        let row = sqlx::query_as::<_, ParticipantModel>(
            r"
            SELECT id, role, online, last_seen_at
            FROM participants
            WHERE id = $1
            ",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Participant::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn update_online_status(
        &self,
        id: Snowflake,
        online: bool,
        last_seen_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE participants
            SET online = $2, last_seen_at = $3
            WHERE id = $1
            ",
        )
        .bind(id.into_inner())
        .bind(online)
        .bind(last_seen_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(participant_not_found(id));
        }

        Ok(())
    }
}
