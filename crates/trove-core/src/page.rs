use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;

/// Resolved pagination window. Non-positive or absent page/limit values
/// clamp to the defaults rather than erroring; see DESIGN.md for the
/// policy decision. Fields are private so every instance goes through
/// `resolve` and both are guaranteed to be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    page: usize,
    limit: usize,
}

impl PageParams {
    pub fn resolve(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: clamp_positive(page, DEFAULT_PAGE),
            limit: clamp_positive(limit, DEFAULT_LIMIT),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of items to skip before the window starts. Saturates, so
    /// an absurdly large requested page yields an offset past every
    /// item rather than overflowing.
    pub fn skip(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

fn clamp_positive(value: Option<i64>, default: usize) -> usize {
    match value {
        None => default,
        Some(v) if v < 1 => 1,
        Some(v) => usize::try_from(v).unwrap_or(usize::MAX),
    }
}

/// One page of results plus the metadata the dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, params: &PageParams, total_items: usize) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + params.limit - 1) / params.limit
        };
        Self {
            items,
            current_page: params.page,
            total_pages,
            total_items,
        }
    }
}
