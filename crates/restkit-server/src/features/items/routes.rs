//! Item API routes
//!
//! - `GET /api/v1/items` - List items (paging, keyword, date range)
//! - `POST /api/v1/items` - Create an item
//! - `GET /api/v1/items/:id` - Get one item
//! - `PUT /api/v1/items/:id` - Replace an item
//! - `PATCH /api/v1/items/:id` - Update some fields of an item
//! - `DELETE /api/v1/items/:id` - Delete an item
//!
//! Collection-level `PUT`, `PATCH` and `DELETE` are not supported and
//! answer 405. A missing item answers 200 with the "Not found" message.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;

use super::commands::{self, CreateItemCommand, PatchItemCommand, ReplaceItemCommand};
use super::queries;
use super::types::{parse_id, Item};
use crate::api::response::Reply;
use crate::context::RequestContext;
use crate::error::RestResult;
use crate::pagination::PgExecutor;
use crate::rest::RestHandlers;

/// Items resource backed by Postgres
#[derive(Clone)]
pub struct ItemsResource {
    pool: PgPool,
    executor: PgExecutor<Item>,
}

impl ItemsResource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            executor: PgExecutor::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl RestHandlers for ItemsResource {
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
    async fn get(&self, ctx: &mut RequestContext) -> RestResult {
        let params = ctx.query()?;
        let page = queries::list::handle(&self.executor, &params).await?;
        Ok(Reply::success(page))
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
    async fn get_by_id(&self, ctx: &mut RequestContext, id: &str) -> RestResult {
        let id = parse_id(id)?;
        match queries::get::handle(&self.pool, id).await? {
            Some(item) => Ok(Reply::success(item)),
            None => Ok(Reply::record_not_found()),
        }
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
    async fn post(&self, ctx: &mut RequestContext) -> RestResult {
        let command: CreateItemCommand = ctx.form().await?;
        let item = commands::create::handle(&self.pool, command).await?;
        Ok(Reply::created(item))
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
    async fn put_by_id(&self, ctx: &mut RequestContext, id: &str) -> RestResult {
        let id = parse_id(id)?;
        let command: ReplaceItemCommand = ctx.form().await?;
        match commands::update::replace(&self.pool, id, command).await? {
            Some(item) => Ok(Reply::updated(item)),
            None => Ok(Reply::record_not_found()),
        }
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
    async fn patch_by_id(&self, ctx: &mut RequestContext, id: &str) -> RestResult {
        let id = parse_id(id)?;
        let command: PatchItemCommand = ctx.form().await?;
        match commands::update::patch(&self.pool, id, command).await? {
            Some(item) => Ok(Reply::updated(item)),
            None => Ok(Reply::record_not_found()),
        }
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
    async fn delete_by_id(&self, ctx: &mut RequestContext, id: &str) -> RestResult {
        let id = parse_id(id)?;
        if commands::delete::handle(&self.pool, id).await? {
            Ok(Reply::deleted(json!({ "id": id })))
        } else {
            Ok(Reply::record_not_found())
        }
    }
}
