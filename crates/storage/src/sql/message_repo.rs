//! Message repository implementation for SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use vault_core::error::{StorageError, StorageResult};
use vault_core::metrics::record_item_written;
use vault_core::models::{EntityType, Item, Message};
use vault_core::ports::{BatchInfo, MessageRepository, ScopeFilter, Window};

use super::helpers::{key_from_db, key_to_db, push_scope, push_window, tx_error, write_error};

const COLUMNS: &str =
    "id, tenant_id, connection_id, message, sent_by_me, delivered, archived, created, sort_key";

/// SQLite implementation of MessageRepository.
pub struct SqlMessageRepository {
    pool: SqlitePool,
}

impl SqlMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn count_query<'a>(tenant_id: &'a str, filter: &'a ScopeFilter) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM messages WHERE tenant_id = ");
        qb.push_bind(tenant_id);
        push_scope(&mut qb, filter.connection_id.as_deref());
        qb
    }
}

#[async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn add_message(&self, message: &Message) -> StorageResult<()> {
        const OP: &str = "add_message";
        let sort_key = key_to_db(message.storable_sort_key(OP)?, OP)?;

        sqlx::query(
            r#"
            INSERT INTO messages (
                id, tenant_id, connection_id, message, sent_by_me,
                delivered, archived, created, sort_key
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.tenant_id)
        .bind(&message.connection_id)
        .bind(&message.message)
        .bind(message.sent_by_me)
        .bind(message.delivered)
        .bind(message.archived)
        .bind(message.created)
        .bind(sort_key)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(OP, e))?;

        record_item_written(EntityType::Message.as_str());
        Ok(())
    }

    async fn get_message(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {COLUMNS} FROM messages WHERE tenant_id = ? AND id = ?"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("get_message", e))?;

        row.map(|r| r.into_message("get_message")).transpose()
    }

    async fn list_messages(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Message>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM messages WHERE tenant_id = "
        ));
        qb.push_bind(tenant_id);
        push_scope(&mut qb, filter.connection_id.as_deref());
        push_window(&mut qb, batch, "list_messages")?;

        // Rows and total are read inside one transaction.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| tx_error("list_messages", e))?;

        let rows: Vec<MessageRow> = qb
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_messages", e))?;
        let total: i64 = Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_messages", e))?;

        tx.commit()
            .await
            .map_err(|e| tx_error("list_messages", e))?;

        let messages = rows
            .into_iter()
            .map(|r| r.into_message("list_messages"))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Window::from_overfetch(messages, batch, total))
    }

    async fn count_messages(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64> {
        Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::query("count_messages", e))
    }

    async fn mark_message_delivered(
        &self,
        tenant_id: &str,
        id: &str,
        delivered: bool,
    ) -> StorageResult<Message> {
        let result =
            sqlx::query("UPDATE messages SET delivered = ? WHERE tenant_id = ? AND id = ?")
                .bind(delivered)
                .bind(tenant_id)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| write_error("mark_message_delivered", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(EntityType::Message, id));
        }

        self.get_message(tenant_id, id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Message, id))
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    tenant_id: String,
    connection_id: String,
    message: String,
    sent_by_me: bool,
    delivered: Option<bool>,
    archived: Option<DateTime<Utc>>,
    created: DateTime<Utc>,
    sort_key: i64,
}

impl MessageRow {
    fn into_message(self, operation: &'static str) -> StorageResult<Message> {
        Ok(Message {
            sort_key: key_from_db(self.sort_key, operation)?,
            id: self.id,
            tenant_id: self.tenant_id,
            connection_id: self.connection_id,
            message: self.message,
            sent_by_me: self.sent_by_me,
            delivered: self.delivered,
            archived: self.archived,
            created: self.created,
        })
    }
}
