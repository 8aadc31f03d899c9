//! Proof repository implementation for SQLite.
//!
//! Same layout as credentials: `proof_attributes` rows are joined and
//! collapsed into their parent proof after fetching.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use vault_core::error::{StorageError, StorageResult};
use vault_core::metrics::record_item_written;
use vault_core::models::{EntityType, Item, Proof, ProofAttribute, ProofUpdate};
use vault_core::ports::{BatchInfo, ProofRepository, ScopeFilter, Window};

use super::helpers::{
    QueryVariant, collapse_rows, key_from_db, key_to_db, order_sql, parse_stored, push_scope,
    push_window, tx_error, write_error,
};

const SELECT_JOINED: &str = r#"
    SELECT p.id, p.tenant_id, p.connection_id, p.role, p.result, p.provable,
           p.initiated_by_us, p.approved, p.verified, p.failed, p.archived, p.created,
           p.sort_key, a.id AS attr_id, a.name AS attr_name,
           a.cred_def_id AS attr_cred_def_id, a.value AS attr_value
    FROM (SELECT * FROM proofs WHERE tenant_id = "#;

const JOIN_ATTRIBUTES: &str = r#") AS p
    LEFT JOIN proof_attributes a
      ON a.tenant_id = p.tenant_id AND a.proof_id = p.id
    ORDER BY p.sort_key "#;

// =============================================================================
// Repository Implementation
// =============================================================================

/// SQLite implementation of ProofRepository.
pub struct SqlProofRepository {
    pool: SqlitePool,
}

impl SqlProofRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn count_query<'a>(tenant_id: &'a str, filter: &'a ScopeFilter) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM proofs WHERE tenant_id = ");
        qb.push_bind(tenant_id);
        push_scope(&mut qb, filter.connection_id.as_deref());
        qb
    }

    async fn fetch_joined(
        conn: &mut SqliteConnection,
        mut qb: QueryBuilder<'_, Sqlite>,
        operation: &'static str,
    ) -> StorageResult<Vec<Proof>> {
        let rows: Vec<ProofJoinRow> = qb
            .build_query_as()
            .fetch_all(conn)
            .await
            .map_err(|e| StorageError::query(operation, e))?;

        collapse_rows(rows, |r| r.id.as_str())
            .into_iter()
            .map(|group| ProofJoinRow::into_proof(group, operation))
            .collect()
    }
}

#[async_trait]
impl ProofRepository for SqlProofRepository {
    async fn add_proof(&self, proof: &Proof) -> StorageResult<()> {
        const OP: &str = "add_proof";
        let sort_key = key_to_db(proof.storable_sort_key(OP)?, OP)?;

        let mut tx = self.pool.begin().await.map_err(|e| tx_error(OP, e))?;

        sqlx::query(
            r#"
            INSERT INTO proofs (
                id, tenant_id, connection_id, role, result, provable, initiated_by_us,
                approved, verified, failed, archived, created, sort_key
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&proof.id)
        .bind(&proof.tenant_id)
        .bind(&proof.connection_id)
        .bind(proof.role.as_str())
        .bind(proof.result)
        .bind(proof.provable)
        .bind(proof.initiated_by_us)
        .bind(proof.approved)
        .bind(proof.verified)
        .bind(proof.failed)
        .bind(proof.archived)
        .bind(proof.created)
        .bind(sort_key)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(OP, e))?;

        for (position, attr) in proof.attributes.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO proof_attributes (
                    tenant_id, proof_id, id, position, name, cred_def_id, value
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&proof.tenant_id)
            .bind(&proof.id)
            .bind(&attr.id)
            .bind(position as i64)
            .bind(&attr.name)
            .bind(&attr.cred_def_id)
            .bind(&attr.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(OP, e))?;
        }

        tx.commit().await.map_err(|e| tx_error(OP, e))?;

        record_item_written(EntityType::Proof.as_str());
        Ok(())
    }

    async fn get_proof(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Proof>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_JOINED);
        qb.push_bind(tenant_id).push(" AND id = ").push_bind(id);
        qb.push(JOIN_ATTRIBUTES).push("ASC, p.id ASC, a.position ASC");

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        let mut proofs = Self::fetch_joined(&mut conn, qb, "get_proof").await?;
        Ok(proofs.pop())
    }

    async fn list_proofs(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Proof>> {
        let direction = order_sql(QueryVariant::select(batch).direction());

        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_JOINED);
        qb.push_bind(tenant_id);
        push_scope(&mut qb, filter.connection_id.as_deref());
        push_window(&mut qb, batch, "list_proofs")?;
        qb.push(JOIN_ATTRIBUTES)
            .push(direction)
            .push(", p.id ")
            .push(direction)
            .push(", a.position ASC");

        // Rows and total are read inside one transaction.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| tx_error("list_proofs", e))?;

        let proofs = Self::fetch_joined(&mut tx, qb, "list_proofs").await?;
        let total: i64 = Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_proofs", e))?;

        tx.commit().await.map_err(|e| tx_error("list_proofs", e))?;

        Ok(Window::from_overfetch(proofs, batch, total))
    }

    async fn count_proofs(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64> {
        Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::query("count_proofs", e))
    }

    async fn update_proof(
        &self,
        tenant_id: &str,
        id: &str,
        update: &ProofUpdate,
    ) -> StorageResult<Proof> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| tx_error("update_proof", e))?;

        let result = sqlx::query(
            r#"
            UPDATE proofs
            SET approved = COALESCE(?, approved),
                verified = COALESCE(?, verified),
                failed = COALESCE(?, failed),
                result = COALESCE(?, result)
            WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(update.approved)
        .bind(update.verified)
        .bind(update.failed)
        .bind(update.result)
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error("update_proof", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(EntityType::Proof, id));
        }

        for (attr_id, value) in &update.values {
            sqlx::query(
                "UPDATE proof_attributes SET value = ? WHERE tenant_id = ? AND proof_id = ? AND id = ?",
            )
            .bind(value)
            .bind(tenant_id)
            .bind(id)
            .bind(attr_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error("update_proof", e))?;
        }

        tx.commit().await.map_err(|e| tx_error("update_proof", e))?;

        self.get_proof(tenant_id, id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Proof, id))
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProofJoinRow {
    id: String,
    tenant_id: String,
    connection_id: String,
    role: String,
    result: bool,
    provable: Option<DateTime<Utc>>,
    initiated_by_us: bool,
    approved: Option<DateTime<Utc>>,
    verified: Option<DateTime<Utc>>,
    failed: Option<DateTime<Utc>>,
    archived: Option<DateTime<Utc>>,
    created: DateTime<Utc>,
    sort_key: i64,
    attr_id: Option<String>,
    attr_name: Option<String>,
    attr_cred_def_id: Option<String>,
    attr_value: Option<String>,
}

impl ProofJoinRow {
    fn attribute(&self) -> Option<ProofAttribute> {
        Some(ProofAttribute {
            id: self.attr_id.clone()?,
            name: self.attr_name.clone()?,
            cred_def_id: self.attr_cred_def_id.clone()?,
            value: self.attr_value.clone()?,
        })
    }

    fn into_proof(group: Vec<ProofJoinRow>, operation: &'static str) -> StorageResult<Proof> {
        let attributes: Vec<ProofAttribute> = group.iter().filter_map(Self::attribute).collect();
        let Some(head) = group.into_iter().next() else {
            return Err(StorageError::malformed(operation, "empty proof group"));
        };

        Ok(Proof {
            role: parse_stored(&head.role, operation)?,
            sort_key: key_from_db(head.sort_key, operation)?,
            id: head.id,
            tenant_id: head.tenant_id,
            connection_id: head.connection_id,
            attributes,
            result: head.result,
            provable: head.provable,
            initiated_by_us: head.initiated_by_us,
            approved: head.approved,
            verified: head.verified,
            failed: head.failed,
            archived: head.archived,
            created: head.created,
        })
    }
}
