//! Credential repository implementation for SQLite.
//!
//! Credentials are stored with their attributes in `credential_values`.
//! Reads join both tables and fold the joined rows back into one
//! [`Credential`] per parent; the over-fetch limit is applied to parents
//! inside a subquery so attribute rows never eat into the page size.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use vault_core::error::{StorageError, StorageResult};
use vault_core::metrics::record_item_written;
use vault_core::models::{Credential, CredentialUpdate, CredentialValue, EntityType, Item};
use vault_core::ports::{BatchInfo, CredentialRepository, ScopeFilter, Window};

use super::helpers::{
    QueryVariant, collapse_rows, key_from_db, key_to_db, order_sql, parse_stored, push_scope,
    push_window, tx_error, write_error,
};

const SELECT_JOINED: &str = r#"
    SELECT c.id, c.tenant_id, c.connection_id, c.role, c.schema_id, c.cred_def_id,
           c.initiated_by_us, c.approved, c.issued, c.failed, c.archived, c.created,
           c.sort_key, v.id AS value_id, v.name AS value_name, v.value AS value_value
    FROM (SELECT * FROM credentials WHERE tenant_id = "#;

const JOIN_VALUES: &str = r#") AS c
    LEFT JOIN credential_values v
      ON v.tenant_id = c.tenant_id AND v.credential_id = c.id
    ORDER BY c.sort_key "#;

// =============================================================================
// Repository Implementation
// =============================================================================

/// SQLite implementation of CredentialRepository.
pub struct SqlCredentialRepository {
    pool: SqlitePool,
}

impl SqlCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn count_query<'a>(tenant_id: &'a str, filter: &'a ScopeFilter) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM credentials WHERE tenant_id = ");
        qb.push_bind(tenant_id);
        push_scope(&mut qb, filter.connection_id.as_deref());
        qb
    }

    async fn fetch_joined(
        conn: &mut SqliteConnection,
        mut qb: QueryBuilder<'_, Sqlite>,
        operation: &'static str,
    ) -> StorageResult<Vec<Credential>> {
        let rows: Vec<CredentialJoinRow> = qb
            .build_query_as()
            .fetch_all(conn)
            .await
            .map_err(|e| StorageError::query(operation, e))?;

        collapse_rows(rows, |r| r.id.as_str())
            .into_iter()
            .map(|group| CredentialJoinRow::into_credential(group, operation))
            .collect()
    }
}

#[async_trait]
impl CredentialRepository for SqlCredentialRepository {
    async fn add_credential(&self, credential: &Credential) -> StorageResult<()> {
        const OP: &str = "add_credential";
        let sort_key = key_to_db(credential.storable_sort_key(OP)?, OP)?;

        let mut tx = self.pool.begin().await.map_err(|e| tx_error(OP, e))?;

        sqlx::query(
            r#"
            INSERT INTO credentials (
                id, tenant_id, connection_id, role, schema_id, cred_def_id,
                initiated_by_us, approved, issued, failed, archived, created, sort_key
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.tenant_id)
        .bind(&credential.connection_id)
        .bind(credential.role.as_str())
        .bind(&credential.schema_id)
        .bind(&credential.cred_def_id)
        .bind(credential.initiated_by_us)
        .bind(credential.approved)
        .bind(credential.issued)
        .bind(credential.failed)
        .bind(credential.archived)
        .bind(credential.created)
        .bind(sort_key)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(OP, e))?;

        for (position, value) in credential.attributes.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO credential_values (tenant_id, credential_id, id, position, name, value)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&credential.tenant_id)
            .bind(&credential.id)
            .bind(&value.id)
            .bind(position as i64)
            .bind(&value.name)
            .bind(&value.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(OP, e))?;
        }

        tx.commit().await.map_err(|e| tx_error(OP, e))?;

        record_item_written(EntityType::Credential.as_str());
        Ok(())
    }

    async fn get_credential(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> StorageResult<Option<Credential>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_JOINED);
        qb.push_bind(tenant_id).push(" AND id = ").push_bind(id);
        qb.push(JOIN_VALUES).push("ASC, c.id ASC, v.position ASC");

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        let mut credentials = Self::fetch_joined(&mut conn, qb, "get_credential").await?;
        Ok(credentials.pop())
    }

    async fn list_credentials(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Credential>> {
        let direction = order_sql(QueryVariant::select(batch).direction());

        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_JOINED);
        qb.push_bind(tenant_id);
        push_scope(&mut qb, filter.connection_id.as_deref());
        push_window(&mut qb, batch, "list_credentials")?;
        qb.push(JOIN_VALUES)
            .push(direction)
            .push(", c.id ")
            .push(direction)
            .push(", v.position ASC");

        // Rows and total are read inside one transaction.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| tx_error("list_credentials", e))?;

        let credentials = Self::fetch_joined(&mut tx, qb, "list_credentials").await?;
        let total: i64 = Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_credentials", e))?;

        tx.commit()
            .await
            .map_err(|e| tx_error("list_credentials", e))?;

        Ok(Window::from_overfetch(credentials, batch, total))
    }

    async fn count_credentials(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
    ) -> StorageResult<i64> {
        Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::query("count_credentials", e))
    }

    async fn update_credential(
        &self,
        tenant_id: &str,
        id: &str,
        update: &CredentialUpdate,
    ) -> StorageResult<Credential> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET approved = COALESCE(?, approved),
                issued = COALESCE(?, issued),
                failed = COALESCE(?, failed)
            WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(update.approved)
        .bind(update.issued)
        .bind(update.failed)
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("update_credential", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(EntityType::Credential, id));
        }

        self.get_credential(tenant_id, id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Credential, id))
    }
}

// =============================================================================
// Row Types
// =============================================================================

/// One credential joined with at most one of its attributes.
#[derive(sqlx::FromRow)]
struct CredentialJoinRow {
    id: String,
    tenant_id: String,
    connection_id: String,
    role: String,
    schema_id: String,
    cred_def_id: String,
    initiated_by_us: bool,
    approved: Option<DateTime<Utc>>,
    issued: Option<DateTime<Utc>>,
    failed: Option<DateTime<Utc>>,
    archived: Option<DateTime<Utc>>,
    created: DateTime<Utc>,
    sort_key: i64,
    value_id: Option<String>,
    value_name: Option<String>,
    value_value: Option<String>,
}

impl CredentialJoinRow {
    /// Fold the rows of a single credential into the domain model.
    fn into_credential(
        group: Vec<CredentialJoinRow>,
        operation: &'static str,
    ) -> StorageResult<Credential> {
        let mut rows = group.into_iter();
        let Some(head) = rows.next() else {
            return Err(StorageError::malformed(operation, "empty credential group"));
        };

        let mut attributes = Vec::new();
        let mut push_value = |row: &CredentialJoinRow| {
            if let (Some(id), Some(name), Some(value)) =
                (&row.value_id, &row.value_name, &row.value_value)
            {
                attributes.push(CredentialValue {
                    id: id.clone(),
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        };
        push_value(&head);
        rows.for_each(|row| push_value(&row));

        Ok(Credential {
            role: parse_stored(&head.role, operation)?,
            sort_key: key_from_db(head.sort_key, operation)?,
            id: head.id,
            tenant_id: head.tenant_id,
            connection_id: head.connection_id,
            schema_id: head.schema_id,
            cred_def_id: head.cred_def_id,
            attributes,
            initiated_by_us: head.initiated_by_us,
            approved: head.approved,
            issued: head.issued,
            failed: head.failed,
            archived: head.archived,
            created: head.created,
        })
    }
}
