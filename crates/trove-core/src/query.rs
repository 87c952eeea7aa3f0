use serde::{Deserialize, Serialize};

use crate::item::{Item, UserId};
use crate::principal::{Principal, Role};

/// Base visibility predicate derived from the requesting principal.
///
/// Admins see everything; everyone else sees only their own items. This
/// scope is ANDed into every list query and is also the authorization
/// check for single-item reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    All,
    Owner(UserId),
}

impl Scope {
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.role {
            Role::Admin => Scope::All,
            Role::User => Scope::Owner(principal.id.clone()),
        }
    }

    pub fn permits(&self, item: &Item) -> bool {
        match self {
            Scope::All => true,
            Scope::Owner(id) => item.owner == *id,
        }
    }
}

/// Narrowing criteria for a list request, as they arrive from the
/// transport layer.
///
/// Category/status/priority are kept as raw strings: the sentinel "All"
/// (or an absent/empty value) means unconstrained, and unknown values
/// become literal equality filters that simply match nothing. Shape
/// validation belongs to the caller, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// A composed query against the item store: visibility scope plus the
/// active filters, with a fixed sort (created_at descending, id
/// ascending on ties) applied by every backend before windowing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemQuery {
    pub scope: Scope,
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ItemQuery {
    /// Query matching everything the scope permits.
    pub fn scoped(scope: Scope) -> Self {
        Self {
            scope,
            ..Default::default()
        }
    }

    /// Compose the scope with the active filters of a list request.
    /// Pagination is left unset; the caller windows separately.
    pub fn with_filter(scope: Scope, filter: &ItemFilter) -> Self {
        Self {
            scope,
            search: filter
                .search
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            category: field_choice(&filter.category),
            status: field_choice(&filter.status),
            priority: field_choice(&filter.priority),
            limit: None,
            offset: None,
        }
    }

    /// Evaluate the predicate against a single item. All active parts
    /// combine with logical AND; search is a case-insensitive substring
    /// test over title OR description.
    pub fn matches(&self, item: &Item) -> bool {
        if !self.scope.permits(item) {
            return false;
        }
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            if !item.title.to_lowercase().contains(&needle)
                && !item.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if item.category.as_str() != category {
                return false;
            }
        }
        if let Some(ref status) = self.status {
            if item.status.as_str() != status {
                return false;
            }
        }
        if let Some(ref priority) = self.priority {
            if item.priority.as_str() != priority {
                return false;
            }
        }
        true
    }
}

/// "All", empty, or absent means the field imposes no restriction.
fn field_choice(value: &Option<String>) -> Option<String> {
    match value.as_deref() {
        None | Some("All") | Some("") => None,
        Some(s) => Some(s.to_owned()),
    }
}

/// Sort newest first, with id ascending so that equal timestamps keep a
/// stable order and pagination stays reproducible across pages.
pub fn sort_newest_first(items: &mut [Item]) {
    items.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
