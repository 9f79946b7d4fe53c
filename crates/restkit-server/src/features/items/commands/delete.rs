//! Delete item command

use sqlx::PgPool;

/// Returns `false` when no item has `id`
#[tracing::instrument(skip(pool))]
pub async fn handle(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM items WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        tracing::info!(item_id = id, "Item deleted");
    }
    Ok(deleted)
}
