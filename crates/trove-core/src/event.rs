use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemId, ItemPatch};

/// Events emitted by an item store after each committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemEvent {
    Created(Box<Item>),
    Updated { id: ItemId, patch: ItemPatch },
    Deleted(ItemId),
}
