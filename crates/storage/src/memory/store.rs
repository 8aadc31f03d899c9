//! In-memory repositories.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use vault_core::error::{StorageError, StorageResult};
use vault_core::metrics::record_item_written;
use vault_core::models::{
    Agent, Connection, Credential, CredentialUpdate, Event, Item, Job, JobUpdate, Message, Proof,
    ProofUpdate,
};
use vault_core::ports::{
    AgentRepository, BatchInfo, ConnectionRepository, CredentialRepository, EventRepository,
    JobFilter, JobRepository, MessageRepository, ProofRepository, Repositories, ScopeFilter,
    Window,
};

use super::collection::Collection;

// =============================================================================
// Registry
// =============================================================================

/// Per-tenant collections of one item type.
///
/// The registry lock is held only to look up or create a collection.
pub struct Registry<T: Item> {
    collections: RwLock<HashMap<String, Arc<Collection<T>>>>,
}

impl<T: Item> Default for Registry<T> {
    fn default() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Item> Registry<T> {
    /// Collection for a tenant, if one was ever written.
    pub async fn get(&self, tenant_id: &str) -> Option<Arc<Collection<T>>> {
        self.collections.read().await.get(tenant_id).cloned()
    }

    /// Collection for a tenant, created empty when missing.
    pub async fn get_or_create(&self, tenant_id: &str) -> Arc<Collection<T>> {
        if let Some(collection) = self.get(tenant_id).await {
            return collection;
        }

        let mut collections = self.collections.write().await;
        collections
            .entry(tenant_id.to_string())
            .or_insert_with(|| {
                debug!(tenant = tenant_id, entity = %T::ENTITY, "Creating collection");
                Arc::new(Collection::default())
            })
            .clone()
    }

    /// Replace a tenant's collection with the given items.
    pub async fn load(&self, tenant_id: &str, items: Vec<T>) {
        let collection = Arc::new(Collection::from_items(items));
        self.collections
            .write()
            .await
            .insert(tenant_id.to_string(), collection);
    }

    async fn add(&self, item: &T, tenant_id: &str, operation: &'static str) -> StorageResult<()> {
        let mut item = item.clone();
        item.set_sort_key(item.storable_sort_key(operation)?);
        self.get_or_create(tenant_id)
            .await
            .append(item, operation)
            .await?;
        record_item_written(T::ENTITY.as_str());
        Ok(())
    }

    async fn find(&self, tenant_id: &str, id: &str) -> Option<T> {
        self.get(tenant_id).await?.get(id).await
    }

    async fn window<F>(
        &self,
        tenant_id: &str,
        batch: &BatchInfo,
        filter: F,
        operation: &'static str,
    ) -> StorageResult<Window<T>>
    where
        F: Fn(&T) -> bool,
    {
        // Same boundary range the relational backend can bind.
        for key in [batch.after, batch.before] {
            if !key.is_unset() && !key.is_storable() {
                return Err(StorageError::ConstraintViolation {
                    operation,
                    message: format!("sort key {key} is out of range"),
                });
            }
        }

        Ok(match self.get(tenant_id).await {
            Some(collection) => collection.window(batch, filter).await,
            None => Collection::default().window(batch, filter).await,
        })
    }

    async fn count<F>(&self, tenant_id: &str, filter: F) -> i64
    where
        F: Fn(&T) -> bool,
    {
        match self.get(tenant_id).await {
            Some(collection) => collection.count(filter).await,
            None => 0,
        }
    }

    async fn update<F>(&self, tenant_id: &str, id: &str, apply: F) -> StorageResult<T>
    where
        F: FnOnce(&mut T),
    {
        let updated = match self.get(tenant_id).await {
            Some(collection) => collection.update(id, apply).await,
            None => None,
        };
        updated.ok_or_else(|| StorageError::not_found(T::ENTITY, id))
    }
}

// =============================================================================
// Repository Implementations
// =============================================================================

/// In-memory implementation of AgentRepository.
#[derive(Default)]
pub struct MemAgentRepository {
    agents: RwLock<HashMap<String, Agent>>,
}

#[async_trait]
impl AgentRepository for MemAgentRepository {
    async fn add_agent(&self, agent: &Agent) -> StorageResult<()> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&agent.tenant_id) {
            return Err(StorageError::ConstraintViolation {
                operation: "add_agent",
                message: format!("tenant {} already has an agent", agent.tenant_id),
            });
        }
        agents.insert(agent.tenant_id.clone(), agent.clone());
        record_item_written("Agent");
        Ok(())
    }

    async fn get_agent(&self, tenant_id: &str) -> StorageResult<Option<Agent>> {
        Ok(self.agents.read().await.get(tenant_id).cloned())
    }
}

/// In-memory implementation of ConnectionRepository.
#[derive(Default)]
pub struct MemConnectionRepository {
    registry: Registry<Connection>,
}

impl MemConnectionRepository {
    /// Access the underlying registry.
    pub fn registry(&self) -> &Registry<Connection> {
        &self.registry
    }
}

#[async_trait]
impl ConnectionRepository for MemConnectionRepository {
    async fn add_connection(&self, connection: &Connection) -> StorageResult<()> {
        self.registry
            .add(connection, &connection.tenant_id, "add_connection")
            .await
    }

    async fn get_connection(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> StorageResult<Option<Connection>> {
        Ok(self.registry.find(tenant_id, id).await)
    }

    async fn list_connections(
        &self,
        tenant_id: &str,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Connection>> {
        self.registry
            .window(tenant_id, batch, |_| true, "list_connections")
            .await
    }

    async fn count_connections(&self, tenant_id: &str) -> StorageResult<i64> {
        Ok(self.registry.count(tenant_id, |_| true).await)
    }

    async fn archive_connection(
        &self,
        tenant_id: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Connection> {
        self.registry
            .update(tenant_id, id, |c| c.archived = Some(at))
            .await
    }
}

/// In-memory implementation of CredentialRepository.
#[derive(Default)]
pub struct MemCredentialRepository {
    registry: Registry<Credential>,
}

impl MemCredentialRepository {
    /// Access the underlying registry.
    pub fn registry(&self) -> &Registry<Credential> {
        &self.registry
    }
}

#[async_trait]
impl CredentialRepository for MemCredentialRepository {
    async fn add_credential(&self, credential: &Credential) -> StorageResult<()> {
        self.registry
            .add(credential, &credential.tenant_id, "add_credential")
            .await
    }

    async fn get_credential(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> StorageResult<Option<Credential>> {
        Ok(self.registry.find(tenant_id, id).await)
    }

    async fn list_credentials(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Credential>> {
        self.registry
            .window(
                tenant_id,
                batch,
                |c| filter.matches(Some(&c.connection_id)),
                "list_credentials",
            )
            .await
    }

    async fn count_credentials(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
    ) -> StorageResult<i64> {
        Ok(self
            .registry
            .count(tenant_id, |c| filter.matches(Some(&c.connection_id)))
            .await)
    }

    async fn update_credential(
        &self,
        tenant_id: &str,
        id: &str,
        update: &CredentialUpdate,
    ) -> StorageResult<Credential> {
        self.registry
            .update(tenant_id, id, |c| update.apply(c))
            .await
    }
}

/// In-memory implementation of ProofRepository.
#[derive(Default)]
pub struct MemProofRepository {
    registry: Registry<Proof>,
}

impl MemProofRepository {
    /// Access the underlying registry.
    pub fn registry(&self) -> &Registry<Proof> {
        &self.registry
    }
}

#[async_trait]
impl ProofRepository for MemProofRepository {
    async fn add_proof(&self, proof: &Proof) -> StorageResult<()> {
        self.registry.add(proof, &proof.tenant_id, "add_proof").await
    }

    async fn get_proof(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Proof>> {
        Ok(self.registry.find(tenant_id, id).await)
    }

    async fn list_proofs(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Proof>> {
        self.registry
            .window(tenant_id, batch, |p| filter.matches(Some(&p.connection_id)), "list_proofs")
            .await
    }

    async fn count_proofs(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64> {
        Ok(self
            .registry
            .count(tenant_id, |p| filter.matches(Some(&p.connection_id)))
            .await)
    }

    async fn update_proof(
        &self,
        tenant_id: &str,
        id: &str,
        update: &ProofUpdate,
    ) -> StorageResult<Proof> {
        self.registry
            .update(tenant_id, id, |p| update.apply(p))
            .await
    }
}

/// In-memory implementation of MessageRepository.
#[derive(Default)]
pub struct MemMessageRepository {
    registry: Registry<Message>,
}

impl MemMessageRepository {
    /// Access the underlying registry.
    pub fn registry(&self) -> &Registry<Message> {
        &self.registry
    }
}

#[async_trait]
impl MessageRepository for MemMessageRepository {
    async fn add_message(&self, message: &Message) -> StorageResult<()> {
        self.registry
            .add(message, &message.tenant_id, "add_message")
            .await
    }

    async fn get_message(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Message>> {
        Ok(self.registry.find(tenant_id, id).await)
    }

    async fn list_messages(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Message>> {
        self.registry
            .window(tenant_id, batch, |m| filter.matches(Some(&m.connection_id)), "list_messages")
            .await
    }

    async fn count_messages(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64> {
        Ok(self
            .registry
            .count(tenant_id, |m| filter.matches(Some(&m.connection_id)))
            .await)
    }

    async fn mark_message_delivered(
        &self,
        tenant_id: &str,
        id: &str,
        delivered: bool,
    ) -> StorageResult<Message> {
        self.registry
            .update(tenant_id, id, |m| m.delivered = Some(delivered))
            .await
    }
}

/// In-memory implementation of EventRepository.
#[derive(Default)]
pub struct MemEventRepository {
    registry: Registry<Event>,
}

impl MemEventRepository {
    /// Access the underlying registry.
    pub fn registry(&self) -> &Registry<Event> {
        &self.registry
    }
}

#[async_trait]
impl EventRepository for MemEventRepository {
    async fn add_event(&self, event: &Event) -> StorageResult<()> {
        self.registry.add(event, &event.tenant_id, "add_event").await
    }

    async fn get_event(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Event>> {
        Ok(self.registry.find(tenant_id, id).await)
    }

    async fn list_events(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Event>> {
        self.registry
            .window(tenant_id, batch, |e| filter.matches(e.connection_id.as_deref()), "list_events")
            .await
    }

    async fn count_events(&self, tenant_id: &str, filter: &ScopeFilter) -> StorageResult<i64> {
        Ok(self
            .registry
            .count(tenant_id, |e| filter.matches(e.connection_id.as_deref()))
            .await)
    }

    async fn mark_event_read(&self, tenant_id: &str, id: &str) -> StorageResult<Event> {
        self.registry.update(tenant_id, id, |e| e.read = true).await
    }
}

/// In-memory implementation of JobRepository.
#[derive(Default)]
pub struct MemJobRepository {
    registry: Registry<Job>,
}

impl MemJobRepository {
    /// Access the underlying registry.
    pub fn registry(&self) -> &Registry<Job> {
        &self.registry
    }
}

#[async_trait]
impl JobRepository for MemJobRepository {
    async fn add_job(&self, job: &Job) -> StorageResult<()> {
        self.registry.add(job, &job.tenant_id, "add_job").await
    }

    async fn get_job(&self, tenant_id: &str, id: &str) -> StorageResult<Option<Job>> {
        Ok(self.registry.find(tenant_id, id).await)
    }

    async fn list_jobs(
        &self,
        tenant_id: &str,
        filter: &JobFilter,
        batch: &BatchInfo,
    ) -> StorageResult<Window<Job>> {
        self.registry
            .window(tenant_id, batch, |j| filter.matches(j), "list_jobs")
            .await
    }

    async fn count_jobs(&self, tenant_id: &str, filter: &JobFilter) -> StorageResult<i64> {
        Ok(self.registry.count(tenant_id, |j| filter.matches(j)).await)
    }

    async fn update_job(&self, tenant_id: &str, id: &str, update: &JobUpdate) -> StorageResult<Job> {
        self.registry
            .update(tenant_id, id, |j| update.apply(j))
            .await
    }
}

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated in-memory repositories implementing the `Repositories` trait.
#[derive(Default)]
pub struct MemRepositories {
    agents: MemAgentRepository,
    connections: MemConnectionRepository,
    credentials: MemCredentialRepository,
    proofs: MemProofRepository,
    messages: MemMessageRepository,
    events: MemEventRepository,
    jobs: MemJobRepository,
}

impl MemRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete connection repository, for bulk loading.
    pub fn connection_store(&self) -> &MemConnectionRepository {
        &self.connections
    }

    /// Concrete credential repository, for bulk loading.
    pub fn credential_store(&self) -> &MemCredentialRepository {
        &self.credentials
    }

    /// Concrete proof repository, for bulk loading.
    pub fn proof_store(&self) -> &MemProofRepository {
        &self.proofs
    }

    /// Concrete message repository, for bulk loading.
    pub fn message_store(&self) -> &MemMessageRepository {
        &self.messages
    }

    /// Concrete event repository, for bulk loading.
    pub fn event_store(&self) -> &MemEventRepository {
        &self.events
    }

    /// Concrete job repository, for bulk loading.
    pub fn job_store(&self) -> &MemJobRepository {
        &self.jobs
    }
}

impl Repositories for MemRepositories {
    fn backend(&self) -> &'static str {
        "memory"
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
