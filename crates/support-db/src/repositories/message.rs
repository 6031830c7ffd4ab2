//! PostgreSQL implementation of MessageRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use support_core::entities::Message;
use support_core::traits::{HistoryPage, HistoryQuery, MessageRepository, RepoResult};
use support_core::value_objects::Snowflake;

use crate::mappers::MessageInsert;
use crate::models::MessageModel;

use super::error::map_db_error;

/// PostgreSQL implementation of MessageRepository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Create a new PgMessageRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self, message), fields(message_id = %message.id, conversation_id = %message.conversation_id))]
    async fn append(&self, message: &Message) -> RepoResult<()> {
        let insert = MessageInsert::new(message);

        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, sender_id, sender_type, content, message_type, created_at, is_read, read_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(insert.id)
        .bind(insert.conversation_id)
        .bind(insert.sender_id)
        .bind(insert.sender_type)
        .bind(insert.content)
        .bind(insert.message_type)
        .bind(message.created_at)
        .bind(message.read)
        .bind(message.read_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_conversation(
        &self,
        conversation_id: Snowflake,
        query: HistoryQuery,
    ) -> RepoResult<HistoryPage> {
        // One extra row tells whether an older page exists
        let fetch = i64::from(query.limit) + 1;

        let rows = match query.before {
            Some(before) => {
                // Fetch messages before cursor (scrolling up)
                sqlx::query_as::<_, MessageModel>(
                    r"
                    SELECT id, conversation_id, sender_id, sender_type, content, message_type, created_at, is_read, read_at
                    FROM messages
                    WHERE conversation_id = $1 AND id < $2
                    ORDER BY id DESC
                    LIMIT $3
                    ",
                )
                .bind(conversation_id.into_inner())
                .bind(before.into_inner())
                .bind(fetch)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                // Fetch latest messages (no cursor)
                sqlx::query_as::<_, MessageModel>(
                    r"
                    SELECT id, conversation_id, sender_id, sender_type, content, message_type, created_at, is_read, read_at
                    FROM messages
                    WHERE conversation_id = $1
                    ORDER BY id DESC
                    LIMIT $2
                    ",
                )
                .bind(conversation_id.into_inner())
                .bind(fetch)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_db_error)?;

        let has_more = rows.len() > query.limit as usize;
        let mut messages = rows
            .into_iter()
            .take(query.limit as usize)
            .map(Message::try_from)
            .collect::<RepoResult<Vec<_>>>()?;
        messages.reverse();

        Ok(HistoryPage { messages, has_more })
    }

    #[instrument(skip(self))]
    async fn mark_read(
        &self,
        conversation_id: Snowflake,
        reader_id: Snowflake,
        read_at: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE messages
            SET is_read = TRUE, read_at = $3
            WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = FALSE
            ",
        )
        .bind(conversation_id.into_inner())
        .bind(reader_id.into_inner())
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn unread_count(&self, conversation_id: Snowflake, reader_id: Snowflake) -> RepoResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM messages
            WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = FALSE
            ",
        )
        .bind(conversation_id.into_inner())
        .bind(reader_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(count.max(0) as u64)
    }
}
