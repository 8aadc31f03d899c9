//! Query service - validated, paginated reads over the active backend.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::error::{VaultError, VaultResult};
use crate::metrics::{QueryTimer, record_query, record_validation_error};
use crate::models::{Agent, Connection, Credential, EntityType, Event, Item, Job, Message, Proof};
use crate::ports::{BatchInfo, BatchRequest, JobFilter, Page, Repositories, ScopeFilter, Window};

/// Entry point for every list and lookup query.
///
/// Each `list_*` call validates the request, asks the repository for a
/// window (items and total count from one snapshot), then assembles the
/// page with cursors. The
/// service holds no state of its own and is cheap to clone.
#[derive(Clone)]
pub struct QueryService {
    repositories: Arc<dyn Repositories>,
}

impl QueryService {
    pub fn new(repositories: Arc<dyn Repositories>) -> Self {
        Self { repositories }
    }

    /// Underlying repositories, for writers.
    pub fn repositories(&self) -> &Arc<dyn Repositories> {
        &self.repositories
    }

    /// Name of the active backend.
    pub fn backend(&self) -> &'static str {
        self.repositories.backend()
    }

    fn validate(&self, request: &BatchRequest, entity: EntityType) -> VaultResult<BatchInfo> {
        BatchInfo::validate(request, entity).map_err(|err| {
            let err = VaultError::from(err);
            warn!(entity = %entity, code = err.code(), error = %err, "Rejected pagination request");
            record_validation_error(entity, err.code());
            err
        })
    }

    fn assemble<T: Item>(&self, window: Window<T>) -> Page<T> {
        record_query(T::ENTITY, self.backend());
        Page::assemble(window)
    }

    fn not_found(entity: EntityType, id: &str) -> VaultError {
        VaultError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    // =========================================================================
    // Lists
    // =========================================================================

    #[instrument(skip(self, request), fields(backend = self.backend()))]
    pub async fn list_connections(
        &self,
        tenant_id: &str,
        request: &BatchRequest,
    ) -> VaultResult<Page<Connection>> {
        let batch = self.validate(request, EntityType::Connection)?;
        let _timer = QueryTimer::new(EntityType::Connection);

        let window = self
            .repositories
            .connections()
            .list_connections(tenant_id, &batch)
            .await?;
        Ok(self.assemble(window))
    }

    #[instrument(skip(self, request), fields(backend = self.backend()))]
    pub async fn list_credentials(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        request: &BatchRequest,
    ) -> VaultResult<Page<Credential>> {
        let batch = self.validate(request, EntityType::Credential)?;
        let _timer = QueryTimer::new(EntityType::Credential);

        let window = self
            .repositories
            .credentials()
            .list_credentials(tenant_id, filter, &batch)
            .await?;
        Ok(self.assemble(window))
    }

    #[instrument(skip(self, request), fields(backend = self.backend()))]
    pub async fn list_proofs(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        request: &BatchRequest,
    ) -> VaultResult<Page<Proof>> {
        let batch = self.validate(request, EntityType::Proof)?;
        let _timer = QueryTimer::new(EntityType::Proof);

        let window = self
            .repositories
            .proofs()
            .list_proofs(tenant_id, filter, &batch)
            .await?;
        Ok(self.assemble(window))
    }

    #[instrument(skip(self, request), fields(backend = self.backend()))]
    pub async fn list_messages(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        request: &BatchRequest,
    ) -> VaultResult<Page<Message>> {
        let batch = self.validate(request, EntityType::Message)?;
        let _timer = QueryTimer::new(EntityType::Message);

        let window = self
            .repositories
            .messages()
            .list_messages(tenant_id, filter, &batch)
            .await?;
        Ok(self.assemble(window))
    }

    #[instrument(skip(self, request), fields(backend = self.backend()))]
    pub async fn list_events(
        &self,
        tenant_id: &str,
        filter: &ScopeFilter,
        request: &BatchRequest,
    ) -> VaultResult<Page<Event>> {
        let batch = self.validate(request, EntityType::Event)?;
        let _timer = QueryTimer::new(EntityType::Event);

        let window = self
            .repositories
            .events()
            .list_events(tenant_id, filter, &batch)
            .await?;
        Ok(self.assemble(window))
    }

    #[instrument(skip(self, request), fields(backend = self.backend()))]
    pub async fn list_jobs(
        &self,
        tenant_id: &str,
        filter: &JobFilter,
        request: &BatchRequest,
    ) -> VaultResult<Page<Job>> {
        let batch = self.validate(request, EntityType::Job)?;
        let _timer = QueryTimer::new(EntityType::Job);

        let window = self
            .repositories
            .jobs()
            .list_jobs(tenant_id, filter, &batch)
            .await?;
        Ok(self.assemble(window))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get_agent(&self, tenant_id: &str) -> VaultResult<Agent> {
        self.repositories
            .agents()
            .get_agent(tenant_id)
            .await?
            .ok_or_else(|| VaultError::UnknownTenant(tenant_id.to_string()))
    }

    pub async fn get_connection(&self, tenant_id: &str, id: &str) -> VaultResult<Connection> {
        self.repositories
            .connections()
            .get_connection(tenant_id, id)
            .await?
            .ok_or_else(|| Self::not_found(EntityType::Connection, id))
    }

    pub async fn get_credential(&self, tenant_id: &str, id: &str) -> VaultResult<Credential> {
        self.repositories
            .credentials()
            .get_credential(tenant_id, id)
            .await?
            .ok_or_else(|| Self::not_found(EntityType::Credential, id))
    }

    pub async fn get_proof(&self, tenant_id: &str, id: &str) -> VaultResult<Proof> {
        self.repositories
            .proofs()
            .get_proof(tenant_id, id)
            .await?
            .ok_or_else(|| Self::not_found(EntityType::Proof, id))
    }

    pub async fn get_message(&self, tenant_id: &str, id: &str) -> VaultResult<Message> {
        self.repositories
            .messages()
            .get_message(tenant_id, id)
            .await?
            .ok_or_else(|| Self::not_found(EntityType::Message, id))
    }

    pub async fn get_event(&self, tenant_id: &str, id: &str) -> VaultResult<Event> {
        self.repositories
            .events()
            .get_event(tenant_id, id)
            .await?
            .ok_or_else(|| Self::not_found(EntityType::Event, id))
    }

    pub async fn get_job(&self, tenant_id: &str, id: &str) -> VaultResult<Job> {
        self.repositories
            .jobs()
            .get_job(tenant_id, id)
            .await?
            .ok_or_else(|| Self::not_found(EntityType::Job, id))
    }
}
