//! PostgreSQL implementation of ConversationRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use support_core::entities::{Conversation, ConversationStatus};
use support_core::error::DomainError;
use support_core::traits::{ConversationRepository, RepoResult};
use support_core::value_objects::Snowflake;

use crate::mappers::ConversationValues;
use crate::models::ConversationModel;

use super::error::{conversation_not_found, map_db_error, map_unique_violation};

const SELECT_COLUMNS: &str = r"
    SELECT id, customer_id, agent_id, status, priority, created_at, updated_at, closed_at,
           last_message_id, last_message_sender_id, last_message_preview, last_message_at,
           customer_unread, agent_unread
    FROM conversations
";

/// PostgreSQL implementation of ConversationRepository
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    /// Create a new PgConversationRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn list_sql(filter: &str) -> String {
        format!("{SELECT_COLUMNS} {filter} ORDER BY updated_at DESC, id DESC")
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id))]
    async fn create(&self, conversation: &Conversation) -> RepoResult<()> {
        let values = ConversationValues::new(conversation);

        sqlx::query(
            r"
            INSERT INTO conversations (
                id, customer_id, agent_id, status, priority, created_at, updated_at, closed_at,
                last_message_id, last_message_sender_id, last_message_preview, last_message_at,
                customer_unread, agent_unread
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(values.id)
        .bind(values.customer_id)
        .bind(values.agent_id)
        .bind(values.status)
        .bind(values.priority)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .bind(conversation.closed_at)
        .bind(values.last_message_id)
        .bind(values.last_message_sender_id)
        .bind(values.last_message_preview)
        .bind(values.last_message_at)
        .bind(values.customer_unread)
        .bind(values.agent_unread)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                DomainError::OpenConversationExists(conversation.customer_id)
            })
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
        let row = sqlx::query_as::<_, ConversationModel>(&sql)
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Conversation::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_open_by_customer(
        &self,
        customer_id: Snowflake,
    ) -> RepoResult<Option<Conversation>> {
        let sql = format!("{SELECT_COLUMNS} WHERE customer_id = $1 AND status <> 'closed'");
        let row = sqlx::query_as::<_, ConversationModel>(&sql)
            .bind(customer_id.into_inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Conversation::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_active(&self) -> RepoResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationModel>(&Self::list_sql("WHERE status <> 'closed'"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(Conversation::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn list_by_status(&self, status: ConversationStatus) -> RepoResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationModel>(&Self::list_sql("WHERE status = $1"))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(Conversation::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn list_by_agent(&self, agent_id: Snowflake) -> RepoResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationModel>(&Self::list_sql("WHERE agent_id = $1"))
            .bind(agent_id.into_inner())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(Conversation::try_from).collect()
    }

    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id))]
    async fn update(&self, conversation: &Conversation) -> RepoResult<()> {
        let values = ConversationValues::new(conversation);

        let result = sqlx::query(
            r"
            UPDATE conversations
            SET agent_id = $2,
                status = $3,
                priority = $4,
                updated_at = $5,
                closed_at = $6,
                last_message_id = $7,
                last_message_sender_id = $8,
                last_message_preview = $9,
                last_message_at = $10,
                customer_unread = $11,
                agent_unread = $12
            WHERE id = $1
            ",
        )
        .bind(values.id)
        .bind(values.agent_id)
        .bind(values.status)
        .bind(values.priority)
        .bind(conversation.updated_at)
        .bind(conversation.closed_at)
        .bind(values.last_message_id)
        .bind(values.last_message_sender_id)
        .bind(values.last_message_preview)
        .bind(values.last_message_at)
        .bind(values.customer_unread)
        .bind(values.agent_unread)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(conversation_not_found(conversation.id));
        }

        Ok(())
    }
}
