//! Job repository implementation for SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use vault_core::error::{StorageError, StorageResult};
use vault_core::metrics::record_item_written;
use vault_core::models::{EntityType, Item, Job, JobStatus, JobUpdate};
use vault_core::ports::{BatchInfo, JobFilter, JobRepository, Window};

use super::helpers::{
    key_from_db, key_to_db, parse_stored, push_scope, push_window, tx_error, write_error,
};

const COLUMNS: &str = "id, tenant_id, protocol_type, protocol_id, connection_id, status, result, \
                       initiated_by_us, updated, created, sort_key";

/// SQLite implementation of JobRepository.
pub struct SqlJobRepository {
    pool: SqlitePool,
}

impl SqlJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn count_query<'a>(tenant_id: &'a str, filter: &'a JobFilter) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM jobs WHERE tenant_id = ");
        qb.push_bind(tenant_id);
        push_job_filter(&mut qb, filter);
        qb
    }
}

/// Append the job filter conditions.
fn push_job_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a JobFilter) {
    push_scope(qb, filter.connection_id.as_deref());
    match filter.completed {
        Some(true) => {
            qb.push(" AND status = ").push_bind(JobStatus::Complete.as_str());
        }
        Some(false) => {
            qb.push(" AND status <> ").push_bind(JobStatus::Complete.as_str());
        }
        None => {}
    }
}

#[async_trait]
impl JobRepository for SqlJobRepository {
    async fn add_job(&self, job: &Job) -> StorageResult<()> {
        const OP: &str = "add_job";
        let sort_key = key_to_db(job.storable_sort_key(OP)?, OP)?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, tenant_id, protocol_type, protocol_id, connection_id, status,
                result, initiated_by_us, updated, created, sort_key
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.tenant_id)
        .bind(job.protocol_type.as_str())
        .bind(&job.protocol_id)
        .bind(&job.connection_id)
        .bind(job.status.as_str())
        .bind(job.result.as_str())
        .bind(job.initiated_by_us)
        .bind(job.updated)
        .bind(job.created)
        .bind(sort_key)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(OP, e))?;

        record_item_written(EntityType::Job.as_str());
        Ok(())
    }

    async fn get_job(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {COLUMNS} FROM jobs WHERE tenant_id = ? AND id = ?"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("get_job", e))?;

        row.map(|r| r.into_job("get_job")).transpose()
    }

    async fn list_jobs(
        &self,
        tenant_id: &str,
        filter: &JobFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Job>> {
        let mut qb =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM jobs WHERE tenant_id = "));
        qb.push_bind(tenant_id);
        push_job_filter(&mut qb, filter);
        push_window(&mut qb, batch, "list_jobs")?;

        // Rows and total are read inside one transaction.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| tx_error("list_jobs", e))?;

        let rows: Vec<JobRow> = qb
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_jobs", e))?;
        let total: i64 = Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::query("list_jobs", e))?;

        tx.commit()
            .await
            .map_err(|e| tx_error("list_jobs", e))?;

        let jobs = rows
            .into_iter()
            .map(|r| r.into_job("list_jobs"))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Window::from_overfetch(jobs, batch, total))
    }

    async fn count_jobs(&self, tenant_id: &str, filter: &JobFilter) -> StorageResult<i64> {
        Self::count_query(tenant_id, filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::query("count_jobs", e))
    }

    async fn update_job(&self, tenant_id: &str, id: &str, update: &JobUpdate) -> StorageResult<Job> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?,
                result = ?,
                protocol_id = COALESCE(?, protocol_id),
                updated = ?
            WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.result.as_str())
        .bind(&update.protocol_id)
        .bind(update.updated)
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("update_job", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(EntityType::Job, id));
        }

        self.get_job(tenant_id, id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Job, id))
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    tenant_id: String,
    protocol_type: String,
    protocol_id: Option<String>,
    connection_id: Option<String>,
    status: String,
    result: String,
    initiated_by_us: bool,
    updated: DateTime<Utc>,
    created: DateTime<Utc>,
    sort_key: i64,
}

impl JobRow {
    fn into_job(self, operation: &'static str) -> StorageResult<Job> {
        Ok(Job {
            protocol_type: parse_stored(&self.protocol_type, operation)?,
            status: parse_stored(&self.status, operation)?,
            result: parse_stored(&self.result, operation)?,
            sort_key: key_from_db(self.sort_key, operation)?,
            id: self.id,
            tenant_id: self.tenant_id,
            protocol_id: self.protocol_id,
            connection_id: self.connection_id,
            initiated_by_us: self.initiated_by_us,
            updated: self.updated,
            created: self.created,
        })
    }
}
