//! The storage plugin boundary: an opaque filter/persistence capability.
//!
//! Out of scope per the bridge's design — the core only calls `filter` and
//! `upsert` through this trait. [`InMemoryStorage`] is a reference
//! implementation used by tests and the bundled example binary, not a
//! production backend.

use async_trait::async_trait;

use crate::item::ResourceItem;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the subset of `items` that should proceed past the filter
    /// stage (e.g. `date_modified` newer than whatever is already stored).
    async fn filter(&self, items: Vec<ResourceItem>) -> Vec<ResourceItem>;

    /// Persists one item. Must be idempotent: handling the same item twice
    /// yields the same storage state.
    async fn upsert(&self, item: ResourceItem);
}

/// `DashMap`-backed reference storage for tests and the example binary.
pub struct InMemoryStorage {
    seen: dashmap::DashMap<String, ResourceItem>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            seen: dashmap::DashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<ResourceItem> {
        self.seen.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn filter(&self, items: Vec<ResourceItem>) -> Vec<ResourceItem> {
        items
            .into_iter()
            .filter(|item| match self.seen.get(&item.id) {
                Some(existing) => item.date_modified > existing.date_modified,
                None => true,
            })
            .collect()
    }

    async fn upsert(&self, item: ResourceItem) {
        self.seen.insert(item.id.clone(), item);
    }
}
