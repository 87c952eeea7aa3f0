//! Error types for the item engine.

use thiserror::Error;

use crate::item::ItemId;
use crate::store::StoreError;
use crate::validate::ValidationErrors;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure taxonomy surfaced by the engine. The transport layer maps
/// each variant to a protocol response; NotFound and Forbidden stay
/// distinct, checked in that order.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The target item does not exist at all.
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// The target item exists but is outside the principal's scope.
    #[error("Not authorized to access item {0}")]
    Forbidden(ItemId),

    /// The draft or patch failed field constraints.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// The underlying store call failed. Not retried here; surfaced as
    /// a transient failure.
    #[error("Store unavailable: {0}")]
    Store(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_engine_not_found() {
        let id = uuid::Uuid::new_v4();
        let err: EngineError = StoreError::NotFound(id).into();
        assert!(matches!(err, EngineError::NotFound(got) if got == id));
    }

    #[test]
    fn other_store_errors_map_to_store_variant() {
        let err: EngineError = StoreError::Storage("connection reset".into()).into();
        assert!(matches!(err, EngineError::Store(msg) if msg.contains("connection reset")));
    }
}
