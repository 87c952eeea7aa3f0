pub mod engine;
pub mod error;
pub mod event;
pub mod item;
pub mod memory_store;
pub mod page;
pub mod principal;
pub mod query;
pub mod stats;
pub mod store;
pub mod validate;

#[cfg(feature = "sqlite")]
pub mod sql_query;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use engine::*;
pub use error::*;
pub use event::*;
pub use item::*;
pub use memory_store::*;
pub use page::*;
pub use principal::*;
pub use query::*;
pub use stats::*;
pub use store::*;
pub use validate::*;

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteItemStore;
