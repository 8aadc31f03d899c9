//! Core domain layer for the vault.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! the query service for the vault. It follows hexagonal architecture
//! principles - this is the innermost layer with no dependencies on
//! infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      vault (binary)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     vault-graphql (API)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      vault-storage                          │
//! │                (SQLite via sqlx | in-memory)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     vault-core  ← YOU ARE HERE              │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Connection, Credential, Proof, etc.)
//! - [`ports`] - Pagination engine and repository traits
//! - [`services`] - Query service
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Pagination
//!
//! Every list query goes through the same pipeline:
//!
//! 1. [`ports::BatchInfo::validate`] checks a raw [`ports::BatchRequest`]
//!    and decodes its cursors
//! 2. The active [`ports::Repositories`] backend returns a [`ports::Window`],
//!    either with over-fetch queries or with [`ports::compute_window`]
//! 3. [`ports::Page::assemble`] stamps cursors onto the window
//!
//! Both backends must produce the same page for the same data.

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
