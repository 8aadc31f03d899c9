//! Connection repository implementation for SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use vault_core::error::{StorageError, StorageResult};
use vault_core::metrics::record_item_written;
use vault_core::models::{Connection, EntityType, Item};
use vault_core::ports::{BatchInfo, ConnectionRepository, Window};

use super::helpers::{key_from_db, key_to_db, push_window, tx_error, write_error};

const COLUMNS: &str = "id, tenant_id, our_did, their_did, their_endpoint, their_label, \
                       invited, approved, archived, created, sort_key";

// =============================================================================
// Repository Implementation
// =============================================================================

/// SQLite implementation of ConnectionRepository.
pub struct SqlConnectionRepository {
    pool: SqlitePool,
}

impl SqlConnectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn count_query(tenant_id: &str) -> QueryBuilder<'_, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM connections WHERE tenant_id = ");
        qb.push_bind(tenant_id);
        qb
    }
}

#[async_trait]
impl ConnectionRepository for SqlConnectionRepository {
    async fn add_connection(&self, connection: &Connection) -> StorageResult<()> {
        const OP: &str = "add_connection";
        let sort_key = key_to_db(connection.storable_sort_key(OP)?, OP)?;

        sqlx::query(
            r#"
            INSERT INTO connections (
                id, tenant_id, our_did, their_did, their_endpoint, their_label,
                invited, approved, archived, created, sort_key
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&connection.id)
        .bind(&connection.tenant_id)
        .bind(&connection.our_did)
        .bind(&connection.their_did)
        .bind(&connection.their_endpoint)
        .bind(&connection.their_label)
        .bind(connection.invited)
        .bind(connection.approved)
        .bind(connection.archived)
        .bind(connection.created)
        .bind(sort_key)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(OP, e))?;

        record_item_written(EntityType::Connection.as_str());
        Ok(())
    }

    async fn get_connection(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> StorageResult<Option<Connection>> {
        let row = sqlx::query_as::<_, ConnectionRow>(&format!(
            "SELECT {COLUMNS} FROM connections WHERE tenant_id = ? AND id = ?"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("get_connection", e))?;

        row.map(|r| r.into_connection("get_connection")).transpose()
    }

    async fn list_connections(
        &self,
        tenant_id: &str,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Connection>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM connections WHERE tenant_id = "
        ));
        qb.push_bind(tenant_id);
        push_window(&mut qb, batch, "list_connections")?;

        // Rows and total are read inside one transaction.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| tx_error("list_connections", e))?;

        let rows: Vec<ConnectionRow> = qb
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_connections", e))?;
        let total: i64 = Self::count_query(tenant_id)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_connections", e))?;

        tx.commit()
            .await
            .map_err(|e| tx_error("list_connections", e))?;

        let connections = rows
            .into_iter()
            .map(|r| r.into_connection("list_connections"))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Window::from_overfetch(connections, batch, total))
    }

    async fn count_connections(&self, tenant_id: &str) -> StorageResult<i64> {
        Self::count_query(tenant_id)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::query("count_connections", e))
    }

    async fn archive_connection(
        &self,
        tenant_id: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Connection> {
        let result =
            sqlx::query("UPDATE connections SET archived = ? WHERE tenant_id = ? AND id = ?")
                .bind(at)
                .bind(tenant_id)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| write_error("archive_connection", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(EntityType::Connection, id));
        }

        self.get_connection(tenant_id, id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Connection, id))
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    id: String,
    tenant_id: String,
    our_did: String,
    their_did: String,
    their_endpoint: String,
    their_label: String,
    invited: bool,
    approved: Option<DateTime<Utc>>,
    archived: Option<DateTime<Utc>>,
    created: DateTime<Utc>,
    sort_key: i64,
}

impl ConnectionRow {
    fn into_connection(self, operation: &'static str) -> StorageResult<Connection> {
        Ok(Connection {
            sort_key: key_from_db(self.sort_key, operation)?,
            id: self.id,
            tenant_id: self.tenant_id,
            our_did: self.our_did,
            their_did: self.their_did,
            their_endpoint: self.their_endpoint,
            their_label: self.their_label,
            invited: self.invited,
            approved: self.approved,
            archived: self.archived,
            created: self.created,
        })
    }
}
