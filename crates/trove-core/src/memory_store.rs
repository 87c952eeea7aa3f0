use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use chrono::Utc;

use crate::event::ItemEvent;
use crate::item::{Item, ItemId, ItemPatch};
use crate::query::{sort_newest_first, ItemQuery};
use crate::stats::GroupCount;
use crate::store::{GroupField, ItemStore, StoreError};

/// In-memory implementation of the ItemStore trait. Used as the
/// embedded default and by the engine's tests; byte-for-byte identical
/// ordering and grouping semantics to the SQLite store.
pub struct MemoryItemStore {
    items: Mutex<BTreeMap<ItemId, Item>>,
    event_tx: Sender<ItemEvent>,
    event_rx: Mutex<Option<Receiver<ItemEvent>>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            items: Mutex::new(BTreeMap::new()),
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
        }
    }

    fn emit(&self, event: ItemEvent) {
        // Ignore send errors (receiver may be dropped)
        let _ = self.event_tx.send(event);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<ItemId, Item>>, StoreError> {
        self.items
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore for MemoryItemStore {
    fn insert(&self, item: Item) -> Result<ItemId, StoreError> {
        let mut items = self.lock()?;
        if items.contains_key(&item.id) {
            return Err(StoreError::AlreadyExists(item.id));
        }
        let id = item.id;
        items.insert(id, item.clone());
        drop(items);
        self.emit(ItemEvent::Created(Box::new(item)));
        Ok(id)
    }

    fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    fn update(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError> {
        let mut items = self.lock()?;
        let item = items.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        item.apply_patch(&patch, Utc::now());
        let updated = item.clone();
        drop(items);
        self.emit(ItemEvent::Updated { id, patch });
        Ok(updated)
    }

    fn delete(&self, id: ItemId) -> Result<(), StoreError> {
        let mut items = self.lock()?;
        if items.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        drop(items);
        self.emit(ItemEvent::Deleted(id));
        Ok(())
    }

    fn query(&self, q: &ItemQuery) -> Result<Vec<Item>, StoreError> {
        let items = self.lock()?;
        let mut matching: Vec<Item> = items.values().filter(|i| q.matches(i)).cloned().collect();
        drop(items);
        sort_newest_first(&mut matching);

        let offset = q.offset.unwrap_or(0);
        let mut windowed: Vec<Item> = matching.into_iter().skip(offset).collect();
        if let Some(limit) = q.limit {
            windowed.truncate(limit);
        }
        Ok(windowed)
    }

    fn count(&self, q: &ItemQuery) -> Result<usize, StoreError> {
        Ok(self.lock()?.values().filter(|i| q.matches(i)).count())
    }

    fn group_counts(
        &self,
        q: &ItemQuery,
        field: GroupField,
    ) -> Result<Vec<GroupCount>, StoreError> {
        let items = self.lock()?;
        let mut groups: BTreeMap<&'static str, usize> = BTreeMap::new();
        for item in items.values().filter(|i| q.matches(i)) {
            let key = match field {
                GroupField::Category => item.category.as_str(),
                GroupField::Status => item.status.as_str(),
                GroupField::Priority => item.priority.as_str(),
            };
            *groups.entry(key).or_insert(0) += 1;
        }
        Ok(groups
            .into_iter()
            .map(|(key, count)| GroupCount {
                key: key.to_owned(),
                count,
            })
            .collect())
    }

    fn subscribe(&self) -> Result<Receiver<ItemEvent>, StoreError> {
        self.event_rx
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))?
            .take()
            .ok_or_else(|| StoreError::Storage("subscribe: receiver already taken".to_string()))
    }
}
