use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Page selection shared by list endpoints
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number, starting at 1 (default: 1)
    #[validate(range(min = 1))]
    pub page: Option<u64>,
    /// Page size (default: 20, max: 100)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Zero-based index for SeaORM paginators.
    pub fn page_index(&self) -> u64 {
        self.page().saturating_sub(1)
    }
}

/// A page of results with totals
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, query: &PageQuery, total_items: u64) -> Self {
        let limit = query.limit();
        Self {
            items,
            page: query.page(),
            limit,
            total_items,
            total_pages: total_items.div_ceil(limit),
        }
    }
}
