//! Pagination types for list queries.
//!
//! These types implement Relay-style cursor pagination. A raw
//! [`BatchRequest`] is validated into a [`BatchInfo`], a storage adapter
//! turns that into a [`Window`] of items, and [`Page::assemble`] stamps
//! cursors onto the window.
//!
//! Cursors are `base64("<EntityType>:<SortKey>")`. They are opaque to
//! clients but not signed; the embedded type tag only prevents replaying
//! a cursor against a different collection.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{PaginationError, PaginationResult};
use crate::models::{EntityType, Item, SortKey};

/// Smallest accepted page size.
pub const MIN_PAGE_SIZE: i32 = 1;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: i32 = 100;

// =============================================================================
// Cursor Codec
// =============================================================================

/// Opaque cursor for pagination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub value: String,
}

impl Cursor {
    /// Encode a sort key for the given entity type.
    pub fn encode(key: SortKey, entity: EntityType) -> Self {
        Self {
            value: BASE64.encode(format!("{}:{}", entity.as_str(), key.value())),
        }
    }

    /// Decode the sort key, checking the embedded entity type.
    pub fn decode(&self, entity: EntityType) -> PaginationResult<SortKey> {
        let invalid = |reason: &str| PaginationError::InvalidCursor {
            entity,
            reason: reason.to_string(),
        };

        let bytes = BASE64
            .decode(self.value.as_bytes())
            .map_err(|_| invalid("not valid base64"))?;
        let text = String::from_utf8(bytes).map_err(|_| invalid("not valid UTF-8"))?;

        let parts: Vec<&str> = text.split(':').collect();
        let [tag, key] = parts.as_slice() else {
            return Err(invalid("expected '<type>:<key>'"));
        };

        let key: u64 = key.parse().map_err(|_| invalid("key is not an unsigned integer"))?;
        if *tag != entity.as_str() {
            return Err(invalid(&format!("cursor was issued for {}", tag)));
        }

        let key = SortKey(key);
        if !key.is_storable() {
            return Err(invalid("key is out of range"));
        }
        Ok(key)
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self { value }
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

// =============================================================================
// Batch Requests
// =============================================================================

/// Pagination parameters as received from the query API.
///
/// Supports forward pagination (`first`/`after`) and backward
/// pagination (`last`/`before`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRequest {
    /// Number of items to fetch from the start.
    pub first: Option<i32>,
    /// Number of items to fetch from the end.
    pub last: Option<i32>,
    /// Cursor to start after.
    pub after: Option<Cursor>,
    /// Cursor to end before.
    pub before: Option<Cursor>,
}

impl BatchRequest {
    /// Forward request for `count` items.
    pub fn first(count: i32) -> Self {
        Self {
            first: Some(count),
            ..Default::default()
        }
    }

    /// Backward request for `count` items.
    pub fn last(count: i32) -> Self {
        Self {
            last: Some(count),
            ..Default::default()
        }
    }

    /// Set the `after` cursor.
    #[must_use]
    pub fn after(mut self, cursor: impl Into<Cursor>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    /// Set the `before` cursor.
    #[must_use]
    pub fn before(mut self, cursor: impl Into<Cursor>) -> Self {
        self.before = Some(cursor.into());
        self
    }
}

/// Ordering direction for sorted queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

/// Validated, normalized pagination request.
///
/// `after`/`before` are [`SortKey`]s where zero means "no boundary".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInfo {
    /// Requested page size (never the over-fetch size).
    pub count: usize,
    /// Fetch from the end of the collection (`last`).
    pub tail: bool,
    pub after: SortKey,
    pub before: SortKey,
}

impl BatchInfo {
    /// Validate a raw request for the given entity type.
    pub fn validate(request: &BatchRequest, entity: EntityType) -> PaginationResult<Self> {
        let (size, tail) = match (request.first, request.last) {
            (Some(first), None) => (first, false),
            (None, Some(last)) => (last, true),
            _ => return Err(PaginationError::MissingPageSize),
        };

        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size) {
            return Err(PaginationError::InvalidPageSize {
                size,
                min: MIN_PAGE_SIZE,
                max: MAX_PAGE_SIZE,
            });
        }

        if request.after.is_some() && request.before.is_some() {
            return Err(PaginationError::ConflictingCursors);
        }

        let after = request
            .after
            .as_ref()
            .map(|c| c.decode(entity))
            .transpose()?
            .unwrap_or_default();
        let before = request
            .before
            .as_ref()
            .map(|c| c.decode(entity))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            count: size as usize,
            tail,
            after,
            before,
        })
    }

    /// Forward batch of `count` items from the start.
    pub fn head(count: usize) -> Self {
        Self {
            count,
            tail: false,
            after: SortKey::default(),
            before: SortKey::default(),
        }
    }

    /// Backward batch of `count` items from the end.
    pub fn tail(count: usize) -> Self {
        Self {
            tail: true,
            ..Self::head(count)
        }
    }

    /// Number of rows to fetch to detect a further page.
    pub fn fetch_limit(&self) -> usize {
        self.count + 1
    }

    /// Physical fetch order.
    pub fn direction(&self) -> OrderDirection {
        if self.tail {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}

// =============================================================================
// Windows
// =============================================================================

/// Windowed slice of a collection, always in ascending sort-key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    /// Number of items passing the filter, read from the same snapshot as
    /// `items`.
    pub total_count: i64,
}

impl<T> Window<T> {
    /// Trim an over-fetched row set into a window.
    ///
    /// `rows` must be in fetch order: ascending for forward batches,
    /// descending for tail batches. At most `batch.fetch_limit()` rows are
    /// expected; any row past `batch.count` only signals another page.
    pub fn from_overfetch(mut rows: Vec<T>, batch: &BatchInfo, total_count: i64) -> Self {
        let has_more = rows.len() > batch.count;
        rows.truncate(batch.count);

        let after_set = !batch.after.is_unset();
        let before_set = !batch.before.is_unset();

        if batch.tail {
            rows.reverse();
            Self {
                items: rows,
                has_next_page: before_set,
                has_previous_page: has_more || after_set,
                total_count,
            }
        } else {
            Self {
                items: rows,
                has_next_page: has_more || before_set,
                has_previous_page: after_set,
                total_count,
            }
        }
    }

    /// Empty window with both flags unset.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_next_page: false,
            has_previous_page: false,
            total_count: 0,
        }
    }
}

// =============================================================================
// Paginated Results
// =============================================================================

/// A single item in a paginated result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<T> {
    /// The actual item.
    pub node: T,
    /// Cursor for this item (used for pagination).
    pub cursor: Cursor,
}

/// Information about the current page in a paginated result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// Whether there are more items after this page.
    pub has_next_page: bool,
    /// Whether there are items before this page.
    pub has_previous_page: bool,
    /// Cursor of the first item in this page.
    pub start_cursor: Option<Cursor>,
    /// Cursor of the last item in this page.
    pub end_cursor: Option<Cursor>,
}

/// Paginated result set with edges, nodes and page info.
///
/// `edges[i].node == nodes[i]` for every `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub edges: Vec<Edge<T>>,
    pub nodes: Vec<T>,
    pub page_info: PageInfo,
    /// Total count of items matching the filter.
    pub total_count: Option<i64>,
}

impl<T: Item> Page<T> {
    /// Build the externally visible result from a window.
    pub fn assemble(window: Window<T>) -> Self {
        let edges: Vec<Edge<T>> = window
            .items
            .iter()
            .map(|item| Edge {
                cursor: Cursor::encode(item.sort_key(), T::ENTITY),
                node: item.clone(),
            })
            .collect();

        let page_info = PageInfo {
            has_next_page: window.has_next_page,
            has_previous_page: window.has_previous_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };

        Self {
            edges,
            nodes: window.items,
            page_info,
            total_count: Some(window.total_count),
        }
    }
}
