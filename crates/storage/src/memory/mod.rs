//! In-memory storage adapter.
//!
//! Every (tenant, entity type) pair owns one [`Collection`], created on
//! first write. Reads against a tenant with no collection see an empty
//! one. Nothing is persisted.

mod collection;
mod store;

pub use collection::Collection;
pub use store::{
    MemAgentRepository, MemConnectionRepository, MemCredentialRepository, MemEventRepository,
    MemJobRepository, MemMessageRepository, MemProofRepository, MemRepositories, Registry,
};
