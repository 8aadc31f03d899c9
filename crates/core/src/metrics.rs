//! Metrics definitions for the vault.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`. Without an installed
//! recorder every call here is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

use crate::models::EntityType;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "vault_queries_total",
        "Total number of paginated list queries served"
    );
    describe_counter!(
        "vault_validation_errors_total",
        "Total number of rejected pagination requests"
    );
    describe_counter!(
        "vault_items_written_total",
        "Total number of items written by the listener"
    );
    describe_histogram!(
        "vault_query_duration_seconds",
        "Time taken to serve a paginated list query in seconds"
    );
}

/// Record a served list query.
///
/// # Arguments
/// * `entity` - The paginated entity type
/// * `backend` - The active storage backend ("sql" or "memory")
pub fn record_query(entity: EntityType, backend: &'static str) {
    counter!("vault_queries_total", "entity" => entity.as_str(), "backend" => backend).increment(1);
}

/// Record a rejected pagination request.
///
/// # Arguments
/// * `entity` - The paginated entity type
/// * `code` - The error code returned to the caller
pub fn record_validation_error(entity: EntityType, code: &'static str) {
    counter!("vault_validation_errors_total", "entity" => entity.as_str(), "code" => code)
        .increment(1);
}

/// Record an item written through a repository.
pub fn record_item_written(kind: &'static str) {
    counter!("vault_items_written_total", "kind" => kind).increment(1);
}

/// A timer that records the query duration when dropped.
pub struct QueryTimer {
    entity: EntityType,
    start: Instant,
}

impl QueryTimer {
    /// Start a new query timer.
    pub fn new(entity: EntityType) -> Self {
        Self {
            entity,
            start: Instant::now(),
        }
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        histogram!("vault_query_duration_seconds", "entity" => self.entity.as_str())
            .record(duration);
    }
}
