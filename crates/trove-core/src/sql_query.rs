use rusqlite::types::Value as SqlValue;

use crate::query::{ItemQuery, Scope};
use crate::store::GroupField;

/// Compiled SQL query fragment with bound parameters.
pub(crate) struct CompiledQuery {
    pub where_clause: String,
    pub params: Vec<SqlValue>,
    pub order_clause: &'static str,
    pub limit_offset: String,
}

/// The one ordering every query uses: newest first, id ascending on
/// timestamp ties. Matches `query::sort_newest_first` exactly (uuid
/// text order equals uuid byte order).
const ORDER_CLAUSE: &str = "ORDER BY created_at DESC, id ASC";

/// Translate an ItemQuery into SQL fragments.
pub(crate) fn compile_query(q: &ItemQuery) -> CompiledQuery {
    let mut params = Vec::new();
    let mut conditions = Vec::new();

    if let Scope::Owner(ref owner) = q.scope {
        conditions.push("owner = ?".to_string());
        params.push(SqlValue::Text(owner.clone()));
    }
    if let Some(ref search) = q.search {
        // LIKE is ASCII-case-insensitive, which is the naive substring
        // semantics listings use.
        let pattern = format!("%{}%", like_escape(search));
        conditions.push("(title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')".to_string());
        params.push(SqlValue::Text(pattern.clone()));
        params.push(SqlValue::Text(pattern));
    }
    for (column, value) in [
        ("category", &q.category),
        ("status", &q.status),
        ("priority", &q.priority),
    ] {
        if let Some(v) = value {
            conditions.push(format!("{} = ?", column));
            params.push(SqlValue::Text(v.clone()));
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // SQLite reads integer literals as i64; saturated usize offsets
    // (see PageParams::skip) must not spill into the REAL range. An
    // offset without a limit still needs a LIMIT clause, and -1 means
    // unbounded.
    let cap = |v: usize| v.min(i64::MAX as usize);
    let limit_offset = match (q.limit, q.offset) {
        (Some(limit), Some(offset)) => {
            format!("LIMIT {} OFFSET {}", cap(limit), cap(offset))
        }
        (Some(limit), None) => format!("LIMIT {}", cap(limit)),
        (None, Some(offset)) => format!("LIMIT -1 OFFSET {}", cap(offset)),
        (None, None) => String::new(),
    };

    CompiledQuery {
        where_clause,
        params,
        order_clause: ORDER_CLAUSE,
        limit_offset,
    }
}

/// Column a grouped count runs over.
pub(crate) fn group_column(field: GroupField) -> &'static str {
    match field {
        GroupField::Category => "category",
        GroupField::Status => "status",
        GroupField::Priority => "priority",
    }
}

/// Escape LIKE wildcards in a search string so they match literally.
fn like_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
