//! List items query
//!
//! Paged, keyword-searchable listing filtered by creation date. Without
//! any date parameter only items created today are returned.

use crate::features::items::types::{Item, ITEM_COLUMNS};
use crate::pagination::{build_query, build_result, ListQuery, PaginationResult, QueryExecutor};
use crate::query::QueryParameters;

pub const TABLE: &str = "items";
pub const DATE_COLUMN: &str = "created_at";

/// Base query before paging and date filtering
pub fn base_query(params: &QueryParameters) -> ListQuery {
    ListQuery::table(TABLE)
        .columns(ITEM_COLUMNS)
        .order_by("created_at DESC, id DESC")
        .search(["name", "description"], params.keyword.as_deref())
}

#[tracing::instrument(
    skip(executor, params),
    fields(page = ?params.page, keyword = ?params.keyword)
)]
pub async fn handle<E>(
    executor: &E,
    params: &QueryParameters,
) -> Result<PaginationResult<Item>, E::Error>
where
    E: QueryExecutor<Row = Item> + ?Sized,
{
    let query = build_query(base_query(params), params, Some(DATE_COLUMN));
    let items = executor.fetch(&query).await?;
    tracing::debug!(count = items.len(), "Fetched item page");
    build_result(executor, &query, items, params).await
}
