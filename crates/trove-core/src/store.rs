use serde::{Deserialize, Serialize};
use std::sync::mpsc::Receiver;

use crate::event::ItemEvent;
use crate::item::{Item, ItemId, ItemPatch};
use crate::query::ItemQuery;
use crate::stats::GroupCount;

/// Field a grouped count can be computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupField {
    Category,
    Status,
    Priority,
}

/// The trait that all storage backends implement.
///
/// Backends are passive: they evaluate the query they are handed and
/// never apply authorization of their own. The scope inside `ItemQuery`
/// is the engine's responsibility.
pub trait ItemStore: Send + Sync {
    /// Insert a new item. Returns the item's ID.
    fn insert(&self, item: Item) -> Result<ItemId, StoreError>;

    /// Get an item by ID.
    fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Apply a patch to an existing item, bumping `updated_at`.
    /// Returns the updated item.
    fn update(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError>;

    /// Delete an item by ID. Hard delete, no tombstone.
    fn delete(&self, id: ItemId) -> Result<(), StoreError>;

    /// Query matching items, sorted newest-first (id-ascending
    /// tie-break) and windowed by the query's limit/offset.
    fn query(&self, q: &ItemQuery) -> Result<Vec<Item>, StoreError>;

    /// Count matching items, ignoring the query's limit/offset.
    fn count(&self, q: &ItemQuery) -> Result<usize, StoreError>;

    /// Count matching items grouped by one field. Only values with at
    /// least one item appear; results are sorted by key.
    fn group_counts(&self, q: &ItemQuery, field: GroupField)
        -> Result<Vec<GroupCount>, StoreError>;

    /// Subscribe to change events. Returns the store's event channel.
    fn subscribe(&self) -> Result<Receiver<ItemEvent>, StoreError>;
}

/// Errors from the item store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    #[error("Item already exists: {0}")]
    AlreadyExists(ItemId),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::NotFound(uuid::Uuid::nil());
        assert!(err.to_string().contains("not found"));

        let err = StoreError::Storage("disk on fire".into());
        assert!(err.to_string().contains("disk on fire"));
    }
}
