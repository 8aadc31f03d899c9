//! Port traits for data repositories.
//!
//! These traits define the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (`vault-storage`), one
//! relational and one in-memory. Both must produce identical windows for
//! the same data and [`BatchInfo`].
//!
//! Every operation is scoped to a tenant. Lookups return `Ok(None)` for a
//! missing item; updates return [`StorageError::NotFound`].
//!
//! A `list_*` window carries the filtered total read in the same snapshot
//! as its items. Writers reject keys outside
//! [`SortKey::MIN`]..=[`SortKey::MAX`] with a constraint violation.
//! Items sharing a sort key are ordered by id.
//!
//! [`SortKey::MIN`]: crate::models::SortKey::MIN
//! [`SortKey::MAX`]: crate::models::SortKey::MAX
//!
//! [`StorageError::NotFound`]: crate::error::StorageError::NotFound

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::models::{
    Agent, Connection, Credential, CredentialUpdate, Event, Job, JobStatus, JobUpdate, Message,
    Proof, ProofUpdate,
};

use super::pagination::{BatchInfo, Window};

// =============================================================================
// Filter Types
// =============================================================================

/// Filter for collections that hang off a pairwise connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    pub connection_id: Option<String>,
}

impl ScopeFilter {
    /// Restrict to a single connection.
    pub fn connection(id: impl Into<String>) -> Self {
        Self {
            connection_id: Some(id.into()),
        }
    }

    /// Whether an item's connection passes the filter.
    pub fn matches(&self, connection_id: Option<&str>) -> bool {
        match &self.connection_id {
            Some(wanted) => connection_id == Some(wanted.as_str()),
            None => true,
        }
    }
}

/// Filter options for job queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub connection_id: Option<String>,
    /// `Some(true)` keeps completed jobs, `Some(false)` keeps the rest.
    pub completed: Option<bool>,
}

impl JobFilter {
    /// Whether a job passes the filter.
    pub fn matches(&self, job: &Job) -> bool {
        let scope = ScopeFilter {
            connection_id: self.connection_id.clone(),
        };
        let completed = match self.completed {
            Some(wanted) => (job.status == JobStatus::Complete) == wanted,
            None => true,
        };
        completed && scope.matches(job.connection_id.as_deref())
    }
}

// =============================================================================
// Repository Traits
// =============================================================================

/// Repository for tenant agents.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Register a tenant agent.
    async fn add_agent(&self, agent: &Agent) -> StorageResult<()>;

    /// Get the agent owning a tenant.
    async fn get_agent(&self, tenant_id: &str) -> StorageResult<Option<Agent>>;
}

/// Repository for pairwise connections.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Insert a connection.
    async fn add_connection(&self, connection: &Connection) -> StorageResult<()>;

    /// Get connection by ID.
    async fn get_connection(&self, tenant_id: &str, id: &str)
    -> StorageResult<Option<Connection>>;

    /// List a window of connections.
    async fn list_connections(
        &self,
        tenant_id: &str,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Connection>>;

    /// Count all connections.
    async fn count_connections(&self, tenant_id: &str) -> StorageResult<i64>;

    /// Set the archive marker.
    async fn archive_connection(
        &self,
        tenant_id: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Connection>;
}

/// Repository for credentials and their attributes.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Insert a credential with its attributes.
    async fn add_credential(&self, credential: &Credential) -> StorageResult<()>;

    /// Get credential by ID.
    async fn get_credential(&self, tenant_id: &str, id: &str)
    -> StorageResult<Option<Credential>>;

    /// List a window of credentials.
    async fn list_credentials(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Credential>>;

    /// Count credentials matching the filter.
    async fn count_credentials(&self, tenant_id: &str, filter: &ScopeFilter)
    -> StorageResult<i64>;

    /// Apply an exchange update.
    async fn update_credential(
        &self,
        tenant_id: &str,
        id: &str,
        update: &CredentialUpdate,
    ) -> StorageResult<Credential>;
}

/// Repository for proofs and their attributes.
#[async_trait]
pub trait ProofRepository: Send + Sync {
    /// Insert a proof with its attributes.
    async fn add_proof(&self, proof: &Proof) -> StorageResult<()>;

    /// Get proof by ID.
    async fn get_proof(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Proof>>;

    /// List a window of proofs.
    async fn list_proofs(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Proof>>;

    /// Count proofs matching the filter.
    async fn count_proofs(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64>;

    /// Apply an exchange update.
    async fn update_proof(
        &self,
        tenant_id: &str,
        id: &str,
        update: &ProofUpdate,
    ) -> StorageResult<Proof>;
}

/// Repository for basic messages.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert a message.
    async fn add_message(&self, message: &Message) -> StorageResult<()>;

    /// Get message by ID.
    async fn get_message(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Message>>;

    /// List a window of messages.
    async fn list_messages(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Message>>;

    /// Count messages matching the filter.
    async fn count_messages(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64>;

    /// Record the delivery outcome.
    async fn mark_message_delivered(
        &self,
        tenant_id: &str,
        id: &str,
        delivered: bool,
    ) -> StorageResult<Message>;
}

/// Repository for notification events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert an event.
    async fn add_event(&self, event: &Event) -> StorageResult<()>;

    /// Get event by ID.
    async fn get_event(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Event>>;

    /// List a window of events.
    async fn list_events(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Event>>;

    /// Count events matching the filter.
    async fn count_events(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64>;

    /// Flag the event as read.
    async fn mark_event_read(&self, tenant_id: &str, id: &str) -> StorageResult<Event>;
}

/// Repository for protocol jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a job.
    async fn add_job(&self, job: &Job) -> StorageResult<()>;

    /// Get job by ID.
    async fn get_job(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Job>>;

    /// List a window of jobs.
    async fn list_jobs(
        &self,
        tenant_id: &str,
        filter: &JobFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Job>>;

    /// Count jobs matching the filter.
    async fn count_jobs(&self, tenant_id: &str, filter: &JobFilter) -> StorageResult<i64>;

    /// Apply a status change.
    async fn update_job(&self, tenant_id: &str, id: &str, update: &JobUpdate)
    -> StorageResult<Job>;
}

// =============================================================================
// Composite Repository
// =============================================================================

/// Combined repository access for the query service and the listener.
pub trait Repositories: Send + Sync {
    /// Short backend name for logs and metrics labels.
    fn backend(&self) -> &'static str;

    /// Access the agent repository.
    fn agents(&self) -> &dyn AgentRepository;

    /// Access the connection repository.
    fn connections(&self) -> &dyn ConnectionRepository;

    /// Access the credential repository.
    fn credentials(&self) -> &dyn CredentialRepository;

    /// Access the proof repository.
    fn proofs(&self) -> &dyn ProofRepository;

    /// Access the message repository.
    fn messages(&self) -> &dyn MessageRepository;

    /// Access the event repository.
    fn events(&self) -> &dyn EventRepository;

    /// Access the job repository.
    fn jobs(&self) -> &dyn JobRepository;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobResult, ProtocolType, SortKey};

    fn job(status: JobStatus, connection_id: Option<&str>) -> Job {
        let at = Utc::now();
        Job {
            id: "j".into(),
            tenant_id: "t".into(),
            protocol_type: ProtocolType::Credential,
            protocol_id: None,
            connection_id: connection_id.map(str::to_string),
            status,
            result: JobResult::None,
            initiated_by_us: false,
            updated: at,
            created: at,
            sort_key: SortKey(1),
        }
    }

    #[test]
    fn scope_filter_without_connection_matches_all() {
        let filter = ScopeFilter::default();
        assert!(filter.matches(None));
        assert!(filter.matches(Some("c1")));
    }

    #[test]
    fn scope_filter_with_connection_excludes_others() {
        let filter = ScopeFilter::connection("c1");
        assert!(filter.matches(Some("c1")));
        assert!(!filter.matches(Some("c2")));
        assert!(!filter.matches(None));
    }

    #[test]
    fn job_filter_completed() {
        let done = job(JobStatus::Complete, Some("c1"));
        let pending = job(JobStatus::Pending, Some("c1"));

        let completed = JobFilter {
            completed: Some(true),
            ..Default::default()
        };
        assert!(completed.matches(&done));
        assert!(!completed.matches(&pending));

        let open = JobFilter {
            connection_id: Some("c1".into()),
            completed: Some(false),
        };
        assert!(open.matches(&pending));
        assert!(!open.matches(&done));
        assert!(!open.matches(&job(JobStatus::Waiting, Some("c2"))));
    }
}
