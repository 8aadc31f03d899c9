//! Storage layer for the vault.
//!
//! This crate provides two implementations of the repository traits
//! defined in `vault-core`:
//!
//! - [`sql`] - SQLite through `sqlx`, with embedded migrations. Windows
//!   are computed by over-fetch queries in one of six shapes.
//! - [`memory`] - Lock-guarded ordered vectors per tenant. Windows are
//!   computed in process with [`vault_core::ports::compute_window`].
//!
//! Both backends return identical pages for identical data; the
//! `cross_backend` integration tests hold them to that.
//!
//! # Usage
//!
//! ```ignore
//! use vault_storage::{Database, DatabaseConfig, SqlRepositories};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_graphql(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! // Create repositories
//! let repositories: Arc<dyn Repositories> = Arc::new(SqlRepositories::new(&db));
//! ```

pub mod memory;
pub mod sql;

pub use memory::MemRepositories;
pub use sql::{Database, DatabaseConfig, SqlRepositories};
