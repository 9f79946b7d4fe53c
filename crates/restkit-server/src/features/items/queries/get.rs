//! Get item by id query

use sqlx::PgPool;

use crate::features::items::types::Item;

#[tracing::instrument(skip(pool))]
pub async fn handle(pool: &PgPool, id: i64) -> Result<Option<Item>, sqlx::Error> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT id, name, description, quantity, created_at, updated_at
        FROM items
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
