//! GraphQL schema definition.
//!
//! Every field is scoped to the tenant carried by the request
//! ([`TenantId`]) and answered by the [`QueryService`] in schema data.

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Result, Schema,
    SchemaBuilder,
};

use vault_core::error::VaultError;
use vault_core::ports::{BatchRequest, Cursor, JobFilter, ScopeFilter};
use vault_core::services::QueryService;

use crate::types::*;

// -----------------------------------------------------------------------------
// Schema Configuration
// -----------------------------------------------------------------------------

/// Maximum query depth.
/// GraphQL introspection requires depth ~13, so we use 15 to allow it.
pub const MAX_QUERY_DEPTH: usize = 15;

/// Maximum query complexity score.
pub const MAX_QUERY_COMPLEXITY: usize = 500;

/// Maximum length for id filter arguments.
const MAX_FILTER_STRING_LENGTH: usize = 128;

// -----------------------------------------------------------------------------
// Schema Builder
// -----------------------------------------------------------------------------

/// Build the vault schema with depth and complexity limits.
pub fn build_schema(service: QueryService) -> VaultSchema {
    schema_builder(service)
        .limit_depth(MAX_QUERY_DEPTH)
        .limit_complexity(MAX_QUERY_COMPLEXITY)
        .finish()
}

/// Create a schema builder with the query service as data.
///
/// Remember to call `.limit_depth()` and `.limit_complexity()` before `.finish()`.
pub fn schema_builder(
    service: QueryService,
) -> SchemaBuilder<VaultQuery, EmptyMutation, EmptySubscription> {
    Schema::build(VaultQuery, EmptyMutation, EmptySubscription).data(service)
}

// -----------------------------------------------------------------------------
// Vault Query
// -----------------------------------------------------------------------------

/// Query root for the vault.
#[derive(Default)]
pub struct VaultQuery;

#[Object]
impl VaultQuery {
    /// Get the agent owning the current tenant.
    async fn agent<'ctx>(&self, ctx: &Context<'ctx>) -> Result<Agent> {
        let (service, tenant) = scope(ctx)?;
        let agent = service.get_agent(tenant).await.map_err(vault_error)?;
        Ok(agent.into())
    }

    /// Get a connection by ID.
    async fn connection<'ctx>(&self, ctx: &Context<'ctx>, id: String) -> Result<Connection> {
        let (service, tenant) = scope(ctx)?;
        let connection = service
            .get_connection(tenant, &id)
            .await
            .map_err(vault_error)?;
        Ok(connection.into())
    }

    /// List connections, oldest first.
    async fn connections<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        first: Option<i32>,
        last: Option<i32>,
        after: Option<String>,
        before: Option<String>,
    ) -> Result<ConnectionConnection> {
        let (service, tenant) = scope(ctx)?;
        let request = batch_request(first, last, after, before);

        let page = service
            .list_connections(tenant, &request)
            .await
            .map_err(vault_error)?;
        Ok(page.into())
    }

    /// Get a credential by ID.
    async fn credential<'ctx>(&self, ctx: &Context<'ctx>, id: String) -> Result<Credential> {
        let (service, tenant) = scope(ctx)?;
        let credential = service
            .get_credential(tenant, &id)
            .await
            .map_err(vault_error)?;
        Ok(credential.into())
    }

    /// List credentials, optionally for a single connection.
    async fn credentials<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        connection_id: Option<String>,
        first: Option<i32>,
        last: Option<i32>,
        after: Option<String>,
        before: Option<String>,
    ) -> Result<CredentialConnection> {
        let (service, tenant) = scope(ctx)?;
        let filter = scope_filter(connection_id)?;
        let request = batch_request(first, last, after, before);

        let page = service
            .list_credentials(tenant, &filter, &request)
            .await
            .map_err(vault_error)?;
        Ok(page.into())
    }

    /// Get a proof by ID.
    async fn proof<'ctx>(&self, ctx: &Context<'ctx>, id: String) -> Result<Proof> {
        let (service, tenant) = scope(ctx)?;
        let proof = service.get_proof(tenant, &id).await.map_err(vault_error)?;
        Ok(proof.into())
    }

    /// List proofs, optionally for a single connection.
    async fn proofs<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        connection_id: Option<String>,
        first: Option<i32>,
        last: Option<i32>,
        after: Option<String>,
        before: Option<String>,
    ) -> Result<ProofConnection> {
        let (service, tenant) = scope(ctx)?;
        let filter = scope_filter(connection_id)?;
        let request = batch_request(first, last, after, before);

        let page = service
            .list_proofs(tenant, &filter, &request)
            .await
            .map_err(vault_error)?;
        Ok(page.into())
    }

    /// Get a message by ID.
    async fn message<'ctx>(&self, ctx: &Context<'ctx>, id: String) -> Result<Message> {
        let (service, tenant) = scope(ctx)?;
        let message = service.get_message(tenant, &id).await.map_err(vault_error)?;
        Ok(message.into())
    }

    /// List basic messages, optionally for a single connection.
    async fn messages<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        connection_id: Option<String>,
        first: Option<i32>,
        last: Option<i32>,
        after: Option<String>,
        before: Option<String>,
    ) -> Result<MessageConnection> {
        let (service, tenant) = scope(ctx)?;
        let filter = scope_filter(connection_id)?;
        let request = batch_request(first, last, after, before);

        let page = service
            .list_messages(tenant, &filter, &request)
            .await
            .map_err(vault_error)?;
        Ok(page.into())
    }

    /// Get an event by ID.
    async fn event<'ctx>(&self, ctx: &Context<'ctx>, id: String) -> Result<Event> {
        let (service, tenant) = scope(ctx)?;
        let event = service.get_event(tenant, &id).await.map_err(vault_error)?;
        Ok(event.into())
    }

    /// List notification events, optionally for a single connection.
    async fn events<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        connection_id: Option<String>,
        first: Option<i32>,
        last: Option<i32>,
        after: Option<String>,
        before: Option<String>,
    ) -> Result<EventConnection> {
        let (service, tenant) = scope(ctx)?;
        let filter = scope_filter(connection_id)?;
        let request = batch_request(first, last, after, before);

        let page = service
            .list_events(tenant, &filter, &request)
            .await
            .map_err(vault_error)?;
        Ok(page.into())
    }

    /// Get a job by ID.
    async fn job<'ctx>(&self, ctx: &Context<'ctx>, id: String) -> Result<Job> {
        let (service, tenant) = scope(ctx)?;
        let job = service.get_job(tenant, &id).await.map_err(vault_error)?;
        Ok(job.into())
    }

    /// List protocol jobs.
    ///
    /// `completed: true` keeps finished jobs, `completed: false` the rest.
    async fn jobs<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        connection_id: Option<String>,
        completed: Option<bool>,
        first: Option<i32>,
        last: Option<i32>,
        after: Option<String>,
        before: Option<String>,
    ) -> Result<JobConnection> {
        let (service, tenant) = scope(ctx)?;
        validate_filter_string(&connection_id, "connectionId")?;
        let filter = JobFilter {
            connection_id,
            completed,
        };
        let request = batch_request(first, last, after, before);

        let page = service
            .list_jobs(tenant, &filter, &request)
            .await
            .map_err(vault_error)?;
        Ok(page.into())
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// Resolve the query service and the tenant of the current request.
fn scope<'ctx>(ctx: &Context<'ctx>) -> Result<(&'ctx QueryService, &'ctx str)> {
    let service = ctx.data::<QueryService>()?;
    let tenant = ctx.data_opt::<TenantId>().ok_or_else(|| {
        async_graphql::Error::new("missing x-tenant-id header")
            .extend_with(|_, e| e.set("code", "MISSING_TENANT"))
    })?;
    Ok((service, tenant.0.as_str()))
}

fn batch_request(
    first: Option<i32>,
    last: Option<i32>,
    after: Option<String>,
    before: Option<String>,
) -> BatchRequest {
    BatchRequest {
        first,
        last,
        after: after.map(Cursor::from),
        before: before.map(Cursor::from),
    }
}

fn scope_filter(connection_id: Option<String>) -> Result<ScopeFilter> {
    validate_filter_string(&connection_id, "connectionId")?;
    Ok(ScopeFilter { connection_id })
}

/// Convert a vault error into a GraphQL error carrying its code.
fn vault_error(err: VaultError) -> async_graphql::Error {
    let code = err.code();
    async_graphql::Error::new(err.to_string()).extend_with(|_, e| e.set("code", code))
}

fn validate_filter_string(s: &Option<String>, field_name: &str) -> Result<()> {
    if let Some(value) = s {
        if value.len() > MAX_FILTER_STRING_LENGTH {
            return Err(async_graphql::Error::new(format!(
                "{} too long: maximum {} characters allowed",
                field_name, MAX_FILTER_STRING_LENGTH
            )));
        }
        if value.is_empty() {
            return Err(async_graphql::Error::new(format!(
                "{} cannot be empty",
                field_name
            )));
        }
    }
    Ok(())
}
