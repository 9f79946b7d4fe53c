//! Pagination and date filtering for list endpoints
//!
//! A list request goes through three steps:
//!
//! 1. [`build_query`] narrows a [`ListQuery`] with a page window and a date
//!    predicate derived from the request's [`QueryParameters`].
//! 2. The handler fetches the page through a [`QueryExecutor`].
//! 3. [`build_result`] counts the full filtered set and wraps the page in a
//!    [`PaginationResult`] envelope payload.
//!
//! Parameters are expected to have passed
//! [`QueryParameters::validate`](crate::query::QueryParameters::validate)
//! already. Unvalidated values that do not parse fall back to defaults.

mod executor;
mod query;

pub use executor::{PgExecutor, QueryExecutor};
pub use query::{Condition, FilteredQuery, ListQuery, SqlValue};

use std::num::IntErrorKind;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::query::QueryParameters;

/// Page size used when the client does not ask for one
pub const DEFAULT_ITEMS_PER_PAGE: i64 = 10;

/// Upper bound on page size
pub const MAX_ITEMS_PER_PAGE: i64 = 100;

/// Resolved page size and page number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub items_per_page: i64,
    pub page: i64,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            page: 1,
        }
    }
}

impl PageWindow {
    /// Non-positive or unparsable sizes fall back to the default, larger
    /// ones are capped. Pages below 1 become 1 and pages past `i64::MAX`
    /// saturate.
    pub fn resolve(params: &QueryParameters) -> Self {
        let items_per_page = positive(params.items_per_page.as_deref())
            .map(|n| n.min(MAX_ITEMS_PER_PAGE))
            .unwrap_or(DEFAULT_ITEMS_PER_PAGE);
        let page = positive(params.page.as_deref()).unwrap_or(1);

        Self {
            items_per_page,
            page,
        }
    }

    pub fn limit(&self) -> i64 {
        self.items_per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.items_per_page)
    }

    /// Number of pages needed to hold `total_items`
    pub fn total_pages(&self, total_items: i64) -> i64 {
        if total_items <= 0 {
            return 0;
        }
        (total_items - 1) / self.items_per_page + 1
    }
}

/// Positive integers too large for `i64` saturate instead of falling back
fn positive(raw: Option<&str>) -> Option<i64> {
    match raw?.trim().parse::<i64>() {
        Ok(n) if n > 0 => Some(n),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(i64::MAX),
        _ => None,
    }
}

/// Date condition applied to a timestamp column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// Rows whose date equals the given day
    On(NaiveDate),
    /// Rows whose date falls in the inclusive range
    Between(NaiveDate, NaiveDate),
}

impl DateFilter {
    /// Pick the filter from the request dates.
    ///
    /// | start | end | filter |
    /// |-------|-----|--------|
    /// | yes   | yes | `[start, end]` |
    /// | yes   | no  | `= start` |
    /// | no    | yes | `[today, end]` |
    /// | no    | no  | `= today` |
    pub fn resolve(params: &QueryParameters, today: NaiveDate) -> Self {
        match (params.start_date(), params.end_date()) {
            (Some(start), Some(end)) => Self::Between(start, end),
            (Some(start), None) => Self::On(start),
            (None, Some(end)) => Self::Between(today, end),
            (None, None) => Self::On(today),
        }
    }
}

/// A [`DateFilter`] bound to the column it constrains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePredicate {
    pub column: String,
    pub filter: DateFilter,
}

/// Narrow `base` with paging and, when `date_column` is given, a date
/// predicate relative to the local calendar day.
pub fn build_query(
    base: ListQuery,
    params: &QueryParameters,
    date_column: Option<&str>,
) -> FilteredQuery {
    build_query_on(base, params, date_column, Local::now().date_naive())
}

/// [`build_query`] with an explicit "today"
pub fn build_query_on(
    base: ListQuery,
    params: &QueryParameters,
    date_column: Option<&str>,
    today: NaiveDate,
) -> FilteredQuery {
    let date = date_column.map(|column| DatePredicate {
        column: column.to_string(),
        filter: DateFilter::resolve(params, today),
    });

    FilteredQuery::new(base, PageWindow::resolve(params), date)
}

/// Paged list payload
///
/// `keyword` and the dates echo what the client sent, not the defaults
/// the query used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResult<T> {
    pub list: Vec<T>,
    pub keyword: Option<String>,
    pub items_per_page: i64,
    pub page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl<T> PaginationResult<T> {
    /// Wrap an already fetched page and its total count
    pub fn assemble(
        list: Vec<T>,
        total_items: i64,
        window: PageWindow,
        params: &QueryParameters,
    ) -> Self {
        Self {
            list,
            keyword: params.keyword.clone(),
            items_per_page: window.items_per_page,
            page: window.page,
            total_items,
            total_pages: window.total_pages(total_items),
            start_date: params.start_date(),
            end_date: params.end_date(),
        }
    }

    /// Map list entries to a different type
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PaginationResult<U> {
        PaginationResult {
            list: self.list.into_iter().map(f).collect(),
            keyword: self.keyword,
            items_per_page: self.items_per_page,
            page: self.page,
            total_items: self.total_items,
            total_pages: self.total_pages,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// Count the full filtered set behind `query` and wrap `list`
///
/// The count ignores the page window but keeps every other condition.
pub async fn build_result<T, E>(
    executor: &E,
    query: &FilteredQuery,
    list: Vec<T>,
    params: &QueryParameters,
) -> Result<PaginationResult<T>, E::Error>
where
    E: QueryExecutor + ?Sized,
{
    let total_items = executor.count(query).await?;
    tracing::debug!(
        table = query.base().table_name(),
        total_items,
        page = query.window().page,
        "Built pagination result"
    );
    Ok(PaginationResult::assemble(list, total_items, query.window(), params))
}
