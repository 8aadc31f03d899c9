//! SQLite storage adapter.
//!
//! This module implements the repository traits defined in `vault-core`
//! using SQLite through `sqlx`.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`SqlRepositories`] - Composite repository implementing `Repositories` trait
//! - Individual repos: `SqlConnectionRepository`, `SqlCredentialRepository`, etc.
//!
//! Every list query is one of six shapes (see [`QueryVariant`]) fetching
//! `count + 1` rows; the extra row only tells whether another page exists.
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_graphql(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = SqlRepositories::new(&db);
//! ```

mod agent_repo;
mod connection_repo;
mod credential_repo;
mod database;
mod event_repo;
mod helpers;
mod job_repo;
mod message_repo;
mod proof_repo;

pub use agent_repo::SqlAgentRepository;
pub use connection_repo::SqlConnectionRepository;
pub use credential_repo::SqlCredentialRepository;
pub use database::{Database, DatabaseConfig};
pub use event_repo::SqlEventRepository;
pub use helpers::QueryVariant;
pub use job_repo::SqlJobRepository;
pub use message_repo::SqlMessageRepository;
pub use proof_repo::SqlProofRepository;

use vault_core::ports::{
    AgentRepository, ConnectionRepository, CredentialRepository, EventRepository, JobRepository,
    MessageRepository, ProofRepository, Repositories,
};

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated SQLite repositories implementing the `Repositories` trait.
///
/// Each repository holds a clone of the pool handle; no other state is
/// kept in process.
pub struct SqlRepositories {
    agents: SqlAgentRepository,
    connections: SqlConnectionRepository,
    credentials: SqlCredentialRepository,
    proofs: SqlProofRepository,
    messages: SqlMessageRepository,
    events: SqlEventRepository,
    jobs: SqlJobRepository,
}

impl SqlRepositories {
    /// Create a new repository aggregate from a database connection.
    pub fn new(db: &Database) -> Self {
        let pool = db.pool();
        Self {
            agents: SqlAgentRepository::new(pool.clone()),
            connections: SqlConnectionRepository::new(pool.clone()),
            credentials: SqlCredentialRepository::new(pool.clone()),
            proofs: SqlProofRepository::new(pool.clone()),
            messages: SqlMessageRepository::new(pool.clone()),
            events: SqlEventRepository::new(pool.clone()),
            jobs: SqlJobRepository::new(pool.clone()),
        }
    }
}

impl Repositories for SqlRepositories {
    fn backend(&self) -> &'static str {
        "sql"
    }

    fn agents(&self) -> &dyn AgentRepository {
        &self.agents
    }

    fn connections(&self) -> &dyn ConnectionRepository {
        &self.connections
    }

    fn credentials(&self) -> &dyn CredentialRepository {
        &self.credentials
    }

    fn proofs(&self) -> &dyn ProofRepository {
        &self.proofs
    }

    fn messages(&self) -> &dyn MessageRepository {
        &self.messages
    }

    fn events(&self) -> &dyn EventRepository {
        &self.events
    }

    fn jobs(&self) -> &dyn JobRepository {
        &self.jobs
    }
}
