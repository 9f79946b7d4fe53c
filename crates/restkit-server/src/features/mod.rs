//! Feature modules served by the demo binary
//!
//! Each feature is a vertical slice with its own commands, queries and
//! REST resource:
//!
//! - **items**: CRUD and paged listing for the `items` table

pub mod items;
pub mod shared;

use sqlx::PgPool;

use crate::router::Routes;

/// Routes of every feature, relative to the API prefix
pub fn routes(pool: PgPool) -> Routes {
    Routes::new().rest("/items", items::ItemsResource::new(pool))
}
