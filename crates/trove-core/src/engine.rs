use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::item::{Item, ItemDraft, ItemId, ItemPatch};
use crate::memory_store::MemoryItemStore;
use crate::page::{PagedResult, PageParams};
use crate::principal::Principal;
use crate::query::{ItemFilter, ItemQuery, Scope};
use crate::stats::{StatsSummary, StatusCounts};
use crate::store::{GroupField, ItemStore};
use crate::validate;

/// The item access and query engine.
///
/// Scopes every read and write to what the requesting principal may
/// see: an item is visible and mutable by its owner or by any admin,
/// and by nobody else. The store is injected at construction so tests
/// and embedders choose their own backend.
pub struct ItemEngine {
    store: Arc<dyn ItemStore>,
}

impl ItemEngine {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Engine over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryItemStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    /// List the items visible to the principal, narrowed by the
    /// filter, sorted newest-first, windowed by page/limit.
    pub fn list_items(
        &self,
        principal: &Principal,
        filter: &ItemFilter,
    ) -> Result<PagedResult<Item>> {
        let scope = Scope::for_principal(principal);
        let params = PageParams::resolve(filter.page, filter.limit);

        let mut query = ItemQuery::with_filter(scope, filter);
        let total = self.store.count(&query)?;
        query.limit = Some(params.limit());
        query.offset = Some(params.skip());
        let items = self.store.query(&query)?;

        debug!(
            principal = %principal.id,
            page = params.page(),
            limit = params.limit(),
            total,
            "listed items"
        );
        Ok(PagedResult::new(items, &params, total))
    }

    /// Fetch one item. Existence is checked before scope, so a missing
    /// item is NotFound and an out-of-scope one is Forbidden.
    pub fn get_item(&self, principal: &Principal, id: ItemId) -> Result<Item> {
        let item = self.store.get(id)?.ok_or(EngineError::NotFound(id))?;
        if !Scope::for_principal(principal).permits(&item) {
            warn!(principal = %principal.id, item = %id, "denied out-of-scope access");
            return Err(EngineError::Forbidden(id));
        }
        Ok(item)
    }

    /// Create an item owned by the principal. Always allowed for an
    /// authenticated principal; the owner comes from the principal,
    /// never from the payload.
    pub fn create_item(&self, principal: &Principal, draft: ItemDraft) -> Result<Item> {
        validate::validate_draft(&draft)?;
        let item = Item::from_draft(draft, principal.id.clone());
        self.store.insert(item.clone())?;
        debug!(principal = %principal.id, item = %item.id, "created item");
        Ok(item)
    }

    /// Patch an item's mutable fields. Ownership is immutable: the
    /// patch type cannot express an owner change.
    pub fn update_item(
        &self,
        principal: &Principal,
        id: ItemId,
        patch: ItemPatch,
    ) -> Result<Item> {
        self.get_item(principal, id)?;
        validate::validate_patch(&patch)?;
        let updated = self.store.update(id, patch)?;
        debug!(principal = %principal.id, item = %id, "updated item");
        Ok(updated)
    }

    /// Hard-delete an item. Returns the deleted id as confirmation.
    pub fn delete_item(&self, principal: &Principal, id: ItemId) -> Result<ItemId> {
        self.get_item(principal, id)?;
        self.store.delete(id)?;
        debug!(principal = %principal.id, item = %id, "deleted item");
        Ok(id)
    }

    /// Summary counts over everything the principal may see. Only the
    /// visibility scope applies; list filters never do.
    pub fn get_stats(&self, principal: &Principal) -> Result<StatsSummary> {
        let query = ItemQuery::scoped(Scope::for_principal(principal));

        let total = self.store.count(&query)?;
        let mut by_status = StatusCounts::default();
        for group in self.store.group_counts(&query, GroupField::Status)? {
            match group.key.as_str() {
                "Active" => by_status.active = group.count,
                "Completed" => by_status.completed = group.count,
                "Pending" => by_status.pending = group.count,
                _ => {}
            }
        }
        let by_category = self.store.group_counts(&query, GroupField::Category)?;
        let by_priority = self.store.group_counts(&query, GroupField::Priority)?;

        Ok(StatsSummary {
            total,
            by_status,
            by_category,
            by_priority,
        })
    }
}
