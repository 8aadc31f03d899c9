//! Lock-guarded ordered collection.

use std::collections::HashMap;

use tokio::sync::RwLock;

use vault_core::error::{StorageError, StorageResult};
use vault_core::models::Item;
use vault_core::ports::{BatchInfo, Window, compute_window};

/// Items of one type for one tenant, kept in ascending `(sort_key, id)`
/// order.
///
/// Readers copy the matching items under the shared lock and compute the
/// window after releasing it. Writers hold the exclusive lock only for the
/// mutation itself.
pub struct Collection<T: Item> {
    inner: RwLock<Inner<T>>,
}

struct Inner<T> {
    items: Vec<T>,
    /// Item id to position in `items`.
    index: HashMap<String, usize>,
}

impl<T: Item> Inner<T> {
    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id().to_string(), pos))
            .collect();
    }
}

impl<T: Item> Default for Collection<T> {
    fn default() -> Self {
        Self::from_items(Vec::new())
    }
}

impl<T: Item> Collection<T> {
    /// Build a collection from unordered items.
    ///
    /// This is the only place a full sort happens. Later ids shadow earlier
    /// duplicates in the lookup index.
    pub fn from_items(mut items: Vec<T>) -> Self {
        items.sort_by(|a, b| a.position().cmp(&b.position()));
        let mut inner = Inner {
            items,
            index: HashMap::new(),
        };
        inner.reindex();
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Append an item.
    ///
    /// Items arriving in order are pushed at the tail. An item ordered
    /// before the current tail is inserted at its position, after every
    /// item with a smaller key or an equal key and smaller id.
    pub async fn append(&self, item: T, operation: &'static str) -> StorageResult<()> {
        let mut inner = self.inner.write().await;

        if inner.index.contains_key(item.id()) {
            return Err(StorageError::ConstraintViolation {
                operation,
                message: format!("duplicate {} id {}", T::ENTITY, item.id()),
            });
        }

        let in_order = inner
            .items
            .last()
            .is_none_or(|last| last.position() <= item.position());

        if in_order {
            let pos = inner.items.len();
            inner.index.insert(item.id().to_string(), pos);
            inner.items.push(item);
        } else {
            let pos = inner
                .items
                .partition_point(|existing| existing.position() <= item.position());
            inner.items.insert(pos, item);
            inner.reindex();
        }

        Ok(())
    }

    /// Mutate an item in place, returning the updated copy.
    ///
    /// The closure must not change the item's id or sort key.
    pub async fn update<F>(&self, id: &str, apply: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        let mut inner = self.inner.write().await;
        let pos = *inner.index.get(id)?;
        let item = inner.items.get_mut(pos)?;
        apply(item);
        Some(item.clone())
    }

    /// Copy of a single item.
    pub async fn get(&self, id: &str) -> Option<T> {
        let inner = self.inner.read().await;
        let pos = *inner.index.get(id)?;
        inner.items.get(pos).cloned()
    }

    /// Window over the items passing `filter`.
    ///
    /// Filtered-out items never take a slot in the window. The total count
    /// is taken from the same snapshot as the items.
    pub async fn window<F>(&self, batch: &BatchInfo, filter: F) -> Window<T>
    where
        F: Fn(&T) -> bool,
    {
        let snapshot: Vec<T> = {
            let inner = self.inner.read().await;
            inner.items.iter().filter(|item| filter(item)).cloned().collect()
        };

        let keys: Vec<_> = snapshot.iter().map(Item::sort_key).collect();
        compute_window(&keys, batch).take(snapshot)
    }

    /// Number of items passing `filter`.
    pub async fn count<F>(&self, filter: F) -> i64
    where
        F: Fn(&T) -> bool,
    {
        let inner = self.inner.read().await;
        inner.items.iter().filter(|item| filter(item)).count() as i64
    }

    /// Total number of items.
    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    /// Whether the collection holds no items.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
