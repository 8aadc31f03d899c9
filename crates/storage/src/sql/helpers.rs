//! Shared helpers for SQL query building and row conversion.

use std::str::FromStr;

use sqlx::{QueryBuilder, Sqlite};

use vault_core::error::{StorageError, StorageResult};
use vault_core::models::{SortKey, UnknownVariant};
use vault_core::ports::{BatchInfo, OrderDirection};

// =============================================================================
// Query Variants
// =============================================================================

/// The six windowing query shapes.
///
/// Requests carrying both `after` and `before` are rejected during
/// validation, so every valid [`BatchInfo`] maps to exactly one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryVariant {
    Asc,
    Desc,
    AfterAsc,
    AfterDesc,
    BeforeAsc,
    BeforeDesc,
}

impl QueryVariant {
    /// Select the variant for a batch.
    pub fn select(batch: &BatchInfo) -> Self {
        match (batch.tail, batch.after.is_unset(), batch.before.is_unset()) {
            (false, true, true) => Self::Asc,
            (true, true, true) => Self::Desc,
            (false, false, _) => Self::AfterAsc,
            (true, false, _) => Self::AfterDesc,
            (false, true, false) => Self::BeforeAsc,
            (true, true, false) => Self::BeforeDesc,
        }
    }

    /// Boundary condition on the sort key column, if any.
    fn boundary(self) -> Option<&'static str> {
        match self {
            Self::Asc | Self::Desc => None,
            Self::AfterAsc | Self::AfterDesc => Some(" AND sort_key > "),
            Self::BeforeAsc | Self::BeforeDesc => Some(" AND sort_key < "),
        }
    }

    /// Physical fetch order.
    pub fn direction(self) -> OrderDirection {
        match self {
            Self::Asc | Self::AfterAsc | Self::BeforeAsc => OrderDirection::Asc,
            Self::Desc | Self::AfterDesc | Self::BeforeDesc => OrderDirection::Desc,
        }
    }
}

/// SQL keyword for an order direction.
pub fn order_sql(direction: OrderDirection) -> &'static str {
    match direction {
        OrderDirection::Asc => "ASC",
        OrderDirection::Desc => "DESC",
    }
}

/// Append the boundary, ordering and over-fetch limit for a batch.
///
/// The builder must be positioned after a `WHERE` clause on the table
/// holding the `sort_key` and `id` columns. Equal keys are ordered by id.
pub fn push_window(
    qb: &mut QueryBuilder<'_, Sqlite>,
    batch: &BatchInfo,
    operation: &'static str,
) -> StorageResult<()> {
    let variant = QueryVariant::select(batch);

    if let Some(condition) = variant.boundary() {
        qb.push(condition)
            .push_bind(key_to_db(bounding_key(batch), operation)?);
    }

    let direction = order_sql(variant.direction());
    qb.push(" ORDER BY sort_key ")
        .push(direction)
        .push(", id ")
        .push(direction)
        .push(" LIMIT ")
        .push_bind(batch.fetch_limit() as i64);
    Ok(())
}

fn bounding_key(batch: &BatchInfo) -> SortKey {
    if batch.after.is_unset() {
        batch.before
    } else {
        batch.after
    }
}

/// Append an optional connection scope.
pub fn push_scope<'a>(qb: &mut QueryBuilder<'a, Sqlite>, connection_id: Option<&'a str>) {
    if let Some(connection_id) = connection_id {
        qb.push(" AND connection_id = ").push_bind(connection_id);
    }
}

// =============================================================================
// Row Conversion
// =============================================================================

/// Sort keys are stored as signed 64-bit integers.
pub fn key_to_db(key: SortKey, operation: &'static str) -> StorageResult<i64> {
    match i64::try_from(key.value()) {
        Ok(value) if key.is_storable() => Ok(value),
        _ => Err(StorageError::ConstraintViolation {
            operation,
            message: format!("sort key {key} is out of range"),
        }),
    }
}

/// Convert a stored sort key back into the domain type.
pub fn key_from_db(value: i64, operation: &'static str) -> StorageResult<SortKey> {
    u64::try_from(value)
        .map(SortKey)
        .map_err(|_| StorageError::malformed(operation, format!("negative sort key {value}")))
}

/// Parse a stored enum column.
pub fn parse_stored<T>(value: &str, operation: &'static str) -> StorageResult<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .parse()
        .map_err(|e: UnknownVariant| StorageError::malformed(operation, e.to_string()))
}

/// Map a write failure, surfacing unique violations as constraint errors.
pub fn write_error(operation: &'static str, err: sqlx::Error) -> StorageError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            StorageError::ConstraintViolation {
                operation,
                message: db.message().to_string(),
            }
        }
        _ => StorageError::query(operation, err),
    }
}

/// Map a transaction begin/commit failure.
pub fn tx_error(operation: &'static str, err: sqlx::Error) -> StorageError {
    StorageError::TransactionError {
        operation,
        message: err.to_string(),
    }
}

// =============================================================================
// Row Collapsing
// =============================================================================

/// Group joined rows into runs sharing the same parent.
///
/// Rows must arrive ordered by parent, so that all rows of one parent are
/// consecutive. The relative order of parents and of rows within a parent
/// is preserved.
pub fn collapse_rows<R, F>(rows: Vec<R>, parent_id: F) -> Vec<Vec<R>>
where
    F: Fn(&R) -> &str,
{
    let mut groups: Vec<Vec<R>> = Vec::new();

    for row in rows {
        match groups.last_mut() {
            Some(group) if group.first().map(&parent_id) == Some(parent_id(&row)) => {
                group.push(row);
            }
            _ => groups.push(vec![row]),
        }
    }

    groups
}
