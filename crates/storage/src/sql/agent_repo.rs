//! Agent repository implementation for SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use vault_core::error::{StorageError, StorageResult};
use vault_core::metrics::record_item_written;
use vault_core::models::Agent;
use vault_core::ports::AgentRepository;

use super::helpers::write_error;

/// SQLite implementation of AgentRepository.
pub struct SqlAgentRepository {
    pool: SqlitePool,
}

impl SqlAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqlAgentRepository {
    async fn add_agent(&self, agent: &Agent) -> StorageResult<()> {
        sqlx::query("INSERT INTO agents (tenant_id, agent_id, label, created) VALUES (?, ?, ?, ?)")
            .bind(&agent.tenant_id)
            .bind(&agent.agent_id)
            .bind(&agent.label)
            .bind(agent.created)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error("add_agent", e))?;

        record_item_written("Agent");
        Ok(())
    }

    async fn get_agent(&self, tenant_id: &str) -> StorageResult<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(
            "SELECT tenant_id, agent_id, label, created FROM agents WHERE tenant_id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("get_agent", e))?;

        Ok(row.map(AgentRow::into_agent))
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    tenant_id: String,
    agent_id: String,
    label: String,
    created: DateTime<Utc>,
}

impl AgentRow {
    fn into_agent(self) -> Agent {
        Agent {
            tenant_id: self.tenant_id,
            agent_id: self.agent_id,
            label: self.label,
            created: self.created,
        }
    }
}
