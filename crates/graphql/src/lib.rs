//! GraphQL API for the vault.
//!
//! Exposes the six paginated collections and single-item lookups of a
//! tenant. The tenant is taken from the `x-tenant-id` header.
//!
//! ```ignore
//! use vault_core::services::QueryService;
//! use vault_graphql::{ServerConfig, build_schema, serve_with_shutdown};
//!
//! let schema = build_schema(QueryService::new(repositories));
//! serve_with_shutdown(schema, ServerConfig::default(), shutdown).await?;
//! ```

mod schema;
mod server;
mod types;

pub use schema::{MAX_QUERY_COMPLEXITY, MAX_QUERY_DEPTH, VaultQuery, build_schema, schema_builder};
pub use server::{ServerConfig, TENANT_HEADER, router, serve_with_shutdown};
pub use types::{PageInfo, TenantId, VaultSchema};
