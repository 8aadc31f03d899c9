//! Event repository implementation for SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use vault_core::error::{StorageError, StorageResult};
use vault_core::metrics::record_item_written;
use vault_core::models::{EntityType, Event, Item};
use vault_core::ports::{BatchInfo, EventRepository, ScopeFilter, Window};

use super::helpers::{key_from_db, key_to_db, push_scope, push_window, tx_error, write_error};

const COLUMNS: &str =
    "id, tenant_id, connection_id, job_id, description, is_read, created, sort_key";

/// SQLite implementation of EventRepository.
pub struct SqlEventRepository {
    pool: SqlitePool,
}

impl SqlEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn count_query<'a>(tenant_id: &'a str, filter: &'a ScopeFilter) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM events WHERE tenant_id = ");
        qb.push_bind(tenant_id);
        push_scope(&mut qb, filter.connection_id.as_deref());
        qb
    }
}

#[async_trait]
impl EventRepository for SqlEventRepository {
    async fn add_event(&self, event: &Event) -> StorageResult<()> {
        const OP: &str = "add_event";
        let sort_key = key_to_db(event.storable_sort_key(OP)?, OP)?;

        sqlx::query(
            r#"
            INSERT INTO events (
                id, tenant_id, connection_id, job_id, description, is_read, created, sort_key
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.tenant_id)
        .bind(&event.connection_id)
        .bind(&event.job_id)
        .bind(&event.description)
        .bind(event.read)
        .bind(event.created)
        .bind(sort_key)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(OP, e))?;

        record_item_written(EntityType::Event.as_str());
        Ok(())
    }

    async fn get_event(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {COLUMNS} FROM events WHERE tenant_id = ? AND id = ?"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("get_event", e))?;

        row.map(|r| r.into_event("get_event")).transpose()
    }

    async fn list_events(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Event>> {
        let mut qb =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM events WHERE tenant_id = "));
        qb.push_bind(tenant_id);
        push_scope(&mut qb, filter.connection_id.as_deref());
        push_window(&mut qb, batch, "list_events")?;

        // Rows and total are read inside one transaction.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| tx_error("list_events", e))?;

        let rows: Vec<EventRow> = qb
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_events", e))?;
        let total: i64 = Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_events", e))?;

        tx.commit()
            .await
            .map_err(|e| tx_error("list_events", e))?;

        let events = rows
            .into_iter()
            .map(|r| r.into_event("list_events"))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Window::from_overfetch(events, batch, total))
    }

    async fn count_events(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64> {
        Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::query("count_events", e))
    }

    async fn mark_event_read(&self, tenant_id: &str, id: &str) -> StorageResult<Event> {
        let result = sqlx::query("UPDATE events SET is_read = 1 WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error("mark_event_read", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(EntityType::Event, id));
        }

        self.get_event(tenant_id, id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Event, id))
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    tenant_id: String,
    connection_id: Option<String>,
    job_id: Option<String>,
    description: String,
    is_read: bool,
    created: DateTime<Utc>,
    sort_key: i64,
}

impl EventRow {
    fn into_event(self, operation: &'static str) -> StorageResult<Event> {
        Ok(Event {
            sort_key: key_from_db(self.sort_key, operation)?,
            id: self.id,
            tenant_id: self.tenant_id,
            connection_id: self.connection_id,
            job_id: self.job_id,
            description: self.description,
            read: self.is_read,
            created: self.created,
        })
    }
}
