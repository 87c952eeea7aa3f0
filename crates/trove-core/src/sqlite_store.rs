use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::event::ItemEvent;
use crate::item::{Category, Item, ItemId, ItemPatch, Priority, Status};
use crate::query::ItemQuery;
use crate::sql_query::{compile_query, group_column};
use crate::stats::GroupCount;
use crate::store::{GroupField, ItemStore, StoreError};

const ITEM_COLUMNS: &str =
    "id, title, description, category, status, priority, owner, created_at, updated_at";

/// SQLite-backed implementation of the ItemStore trait.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
    event_tx: Sender<ItemEvent>,
    event_rx: Mutex<Option<Receiver<ItemEvent>>>,
}

impl SqliteItemStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn =
            Connection::open(path).map_err(|e| StoreError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            conn: Mutex::new(conn),
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                owner TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_owner ON items(owner);
            CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);
            CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
            CREATE INDEX IF NOT EXISTS idx_items_priority ON items(priority);
            CREATE INDEX IF NOT EXISTS idx_items_created ON items(created_at);
            ",
        )
        .map_err(|e| StoreError::Storage(format!("init_schema: {}", e)))
    }

    fn emit(&self, event: ItemEvent) {
        // Ignore send errors (receiver may be dropped)
        let _ = self.event_tx.send(event);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn row_to_item(row: &rusqlite::Row<'_>) -> Result<Item, StoreError> {
        let id_str: String = row
            .get(0)
            .map_err(|e| StoreError::Storage(format!("row id: {}", e)))?;
        let id: ItemId =
            uuid::Uuid::parse_str(&id_str).map_err(|e| StoreError::Storage(e.to_string()))?;

        let title: String = row
            .get(1)
            .map_err(|e| StoreError::Storage(format!("row title: {}", e)))?;
        let description: String = row
            .get(2)
            .map_err(|e| StoreError::Storage(format!("row description: {}", e)))?;
        let category_str: String = row
            .get(3)
            .map_err(|e| StoreError::Storage(format!("row category: {}", e)))?;
        let status_str: String = row
            .get(4)
            .map_err(|e| StoreError::Storage(format!("row status: {}", e)))?;
        let priority_str: String = row
            .get(5)
            .map_err(|e| StoreError::Storage(format!("row priority: {}", e)))?;
        let owner: String = row
            .get(6)
            .map_err(|e| StoreError::Storage(format!("row owner: {}", e)))?;
        let created_ms: i64 = row
            .get(7)
            .map_err(|e| StoreError::Storage(format!("row created_at: {}", e)))?;
        let updated_ms: i64 = row
            .get(8)
            .map_err(|e| StoreError::Storage(format!("row updated_at: {}", e)))?;

        let category = Category::parse(&category_str)
            .ok_or_else(|| StoreError::Storage(format!("bad category: {}", category_str)))?;
        let status = Status::parse(&status_str)
            .ok_or_else(|| StoreError::Storage(format!("bad status: {}", status_str)))?;
        let priority = Priority::parse(&priority_str)
            .ok_or_else(|| StoreError::Storage(format!("bad priority: {}", priority_str)))?;

        Ok(Item {
            id,
            title,
            description,
            category,
            status,
            priority,
            owner,
            created_at: timestamp(created_ms),
            updated_at: timestamp(updated_ms),
        })
    }

    fn get_on_conn(conn: &Connection, id: ItemId) -> Result<Option<Item>, StoreError> {
        let sql = format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Storage(format!("prepare get: {}", e)))?;
        let item = stmt
            .query_row(params![id.to_string()], |row| Ok(Self::row_to_item(row)))
            .optional()
            .map_err(|e| StoreError::Storage(format!("query get: {}", e)))?;
        match item {
            Some(Ok(item)) => Ok(Some(item)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

fn timestamp(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

impl ItemStore for SqliteItemStore {
    fn insert(&self, item: Item) -> Result<ItemId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO items (id, title, description, category, status, priority, owner, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.id.to_string(),
                item.title,
                item.description,
                item.category.as_str(),
                item.status.as_str(),
                item.priority.as_str(),
                item.owner,
                item.created_at.timestamp_millis(),
                item.updated_at.timestamp_millis(),
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return StoreError::AlreadyExists(item.id);
                }
            }
            StoreError::Storage(format!("insert: {}", e))
        })?;
        let id = item.id;
        drop(conn);
        self.emit(ItemEvent::Created(Box::new(item)));
        Ok(id)
    }

    fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let conn = self.lock()?;
        Self::get_on_conn(&conn, id)
    }

    fn update(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError> {
        let conn = self.lock()?;
        let mut item = Self::get_on_conn(&conn, id)?.ok_or(StoreError::NotFound(id))?;
        item.apply_patch(&patch, Utc::now());

        conn.execute(
            "UPDATE items
             SET title = ?1, description = ?2, category = ?3, status = ?4, priority = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                item.title,
                item.description,
                item.category.as_str(),
                item.status.as_str(),
                item.priority.as_str(),
                item.updated_at.timestamp_millis(),
                id.to_string(),
            ],
        )
        .map_err(|e| StoreError::Storage(format!("update: {}", e)))?;

        drop(conn);
        self.emit(ItemEvent::Updated { id, patch });
        Ok(item)
    }

    fn delete(&self, id: ItemId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn
            .execute("DELETE FROM items WHERE id = ?1", params![id.to_string()])
            .map_err(|e| StoreError::Storage(format!("delete: {}", e)))?;
        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        drop(conn);
        self.emit(ItemEvent::Deleted(id));
        Ok(())
    }

    fn query(&self, q: &ItemQuery) -> Result<Vec<Item>, StoreError> {
        let conn = self.lock()?;
        let compiled = compile_query(q);
        let sql = format!(
            "SELECT {} FROM items {} {} {}",
            ITEM_COLUMNS, compiled.where_clause, compiled.order_clause, compiled.limit_offset
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> = compiled
            .params
            .iter()
            .map(|p| p as &dyn rusqlite::types::ToSql)
            .collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Storage(format!("prepare query: {} (sql: {})", e, sql)))?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| Ok(Self::row_to_item(row)))
            .map_err(|e| StoreError::Storage(format!("query: {}", e)))?;

        let mut items = Vec::new();
        for row_result in rows {
            let item_result = row_result.map_err(|e| StoreError::Storage(format!("row: {}", e)))?;
            items.push(item_result?);
        }
        Ok(items)
    }

    fn count(&self, q: &ItemQuery) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let compiled = compile_query(q);
        let sql = format!("SELECT COUNT(*) FROM items {}", compiled.where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> = compiled
            .params
            .iter()
            .map(|p| p as &dyn rusqlite::types::ToSql)
            .collect();

        let count: i64 = conn
            .query_row(&sql, params_ref.as_slice(), |row| row.get(0))
            .map_err(|e| StoreError::Storage(format!("count: {}", e)))?;
        Ok(count as usize)
    }

    fn group_counts(
        &self,
        q: &ItemQuery,
        field: GroupField,
    ) -> Result<Vec<GroupCount>, StoreError> {
        let conn = self.lock()?;
        let compiled = compile_query(q);
        let column = group_column(field);
        let sql = format!(
            "SELECT {col}, COUNT(*) FROM items {where_clause} GROUP BY {col} ORDER BY {col}",
            col = column,
            where_clause = compiled.where_clause
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> = compiled
            .params
            .iter()
            .map(|p| p as &dyn rusqlite::types::ToSql)
            .collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Storage(format!("prepare group: {}", e)))?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                let key: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok(GroupCount {
                    key,
                    count: count as usize,
                })
            })
            .map_err(|e| StoreError::Storage(format!("group: {}", e)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Storage(format!("group rows: {}", e)))
    }

    fn subscribe(&self) -> Result<Receiver<ItemEvent>, StoreError> {
        self.event_rx
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))?
            .take()
            .ok_or_else(|| StoreError::Storage("subscribe: receiver already taken".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemDraft;
    use crate::query::Scope;
    use chrono::Duration;

    fn make_item(owner: &str, title: &str, age_secs: i64) -> Item {
        let mut item = Item::from_draft(
            ItemDraft {
                title: title.into(),
                description: format!("description of {}", title),
                ..Default::default()
            },
            owner.into(),
        );
        // Millisecond precision survives the round-trip; seconds keep
        // the ordering unambiguous.
        item.created_at = timestamp((Utc::now() - Duration::seconds(age_secs)).timestamp_millis());
        item.updated_at = item.created_at;
        item
    }

    #[test]
    fn insert_and_get_round_trip() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let mut item = make_item("u1", "Buy milk", 0);
        item.category = Category::Shopping;
        item.priority = Priority::High;
        let id = store.insert(item.clone()).unwrap();
        let got = store.get(id).unwrap().unwrap();
        assert_eq!(got, item);
    }

    #[test]
    fn insert_duplicate_fails() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let item = make_item("u1", "Once", 0);
        store.insert(item.clone()).unwrap();
        assert!(matches!(
            store.insert(item).unwrap_err(),
            StoreError::AlreadyExists(_)
        ));
    }

    #[test]
    fn update_applies_patch() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let item = make_item("u1", "Old", 60);
        let id = store.insert(item.clone()).unwrap();

        let updated = store
            .update(
                id,
                ItemPatch {
                    title: Some("New".into()),
                    status: Some(Status::Pending),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.status, Status::Pending);
        assert_eq!(updated.owner, "u1");

        let got = store.get(id).unwrap().unwrap();
        assert_eq!(got.title, "New");
        assert_eq!(got.description, item.description);
        assert_eq!(got.created_at, item.created_at);
    }

    #[test]
    fn update_and_delete_missing_fail() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            store.update(id, ItemPatch::default()).unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store.delete(id).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn query_scoped_to_owner() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        store.insert(make_item("u1", "Mine", 1)).unwrap();
        store.insert(make_item("u2", "Theirs", 2)).unwrap();

        let q = ItemQuery::scoped(Scope::Owner("u1".into()));
        let results = store.query(&q).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].owner, "u1");
        assert_eq!(store.count(&q).unwrap(), 1);
    }

    #[test]
    fn like_search_is_case_insensitive() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        store.insert(make_item("u1", "Buy Milk", 1)).unwrap();
        let mut described = make_item("u1", "Groceries", 2);
        described.description = "almond milk substitute".into();
        store.insert(described).unwrap();
        store.insert(make_item("u1", "Laundry", 3)).unwrap();

        let mut q = ItemQuery::scoped(Scope::All);
        q.search = Some("MILK".into());
        assert_eq!(store.query(&q).unwrap().len(), 2);
    }

    #[test]
    fn search_wildcards_match_literally() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let mut pct = make_item("u1", "Report", 1);
        pct.description = "50% done".into();
        store.insert(pct).unwrap();
        store.insert(make_item("u1", "Other", 2)).unwrap();

        let mut q = ItemQuery::scoped(Scope::All);
        q.search = Some("50%".into());
        assert_eq!(store.query(&q).unwrap().len(), 1);

        q.search = Some("0%d".into()); // '%' must not act as a wildcard
        assert_eq!(store.query(&q).unwrap().len(), 0);
    }

    #[test]
    fn query_ordering_and_window_match_memory_semantics() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        for i in 0..7 {
            store
                .insert(make_item("u1", &format!("Item {}", i), i * 10))
                .unwrap();
        }

        let mut q = ItemQuery::scoped(Scope::All);
        q.limit = Some(3);
        q.offset = Some(2);
        let results = store.query(&q).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Item 2");
        assert_eq!(results[2].title, "Item 4");
        assert_eq!(store.count(&q).unwrap(), 7);
    }

    #[test]
    fn offset_without_limit_returns_the_remainder() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .insert(make_item("u1", &format!("Item {}", i), i * 10))
                .unwrap();
        }

        let mut q = ItemQuery::scoped(Scope::All);
        q.offset = Some(2);
        let results = store.query(&q).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Item 2");
        assert_eq!(results[2].title, "Item 4");
    }

    #[test]
    fn equal_timestamps_fall_back_to_id_order() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let now = timestamp(Utc::now().timestamp_millis());
        let mut ids = Vec::new();
        for i in 0..4 {
            let mut item = make_item("u1", &format!("Tied {}", i), 0);
            item.created_at = now;
            item.updated_at = now;
            ids.push(item.id);
            store.insert(item).unwrap();
        }
        ids.sort();

        let q = ItemQuery::scoped(Scope::All);
        let got: Vec<ItemId> = store.query(&q).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn group_counts_scoped_and_sorted() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let mut a = make_item("u1", "a", 1);
        a.category = Category::Work;
        let mut b = make_item("u1", "b", 2);
        b.category = Category::Health;
        let mut c = make_item("u2", "c", 3);
        c.category = Category::Work;
        store.insert(a).unwrap();
        store.insert(b).unwrap();
        store.insert(c).unwrap();

        let q = ItemQuery::scoped(Scope::Owner("u1".into()));
        let groups = store.group_counts(&q, GroupField::Category).unwrap();
        let keys: Vec<_> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Health", "Work"]);
        assert!(groups.iter().all(|g| g.count == 1));
    }

    #[test]
    fn event_emission() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let rx = store.subscribe().unwrap();

        let id = store.insert(make_item("u1", "Event test", 0)).unwrap();
        assert!(matches!(rx.try_recv().unwrap(), ItemEvent::Created(_)));

        store
            .update(
                id,
                ItemPatch {
                    status: Some(Status::Completed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(matches!(rx.try_recv().unwrap(), ItemEvent::Updated { .. }));

        store.delete(id).unwrap();
        assert!(matches!(rx.try_recv().unwrap(), ItemEvent::Deleted(_)));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.db");

        let item = make_item("u1", "Durable", 0);
        let id = item.id;
        {
            let store = SqliteItemStore::open(&path).unwrap();
            store.insert(item.clone()).unwrap();
        }

        let store = SqliteItemStore::open(&path).unwrap();
        let got = store.get(id).unwrap().unwrap();
        assert_eq!(got, item);
    }
}
