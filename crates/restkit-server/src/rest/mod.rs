//! Resource handlers and method dispatch
//!
//! A resource implements [`RestHandlers`], overriding only the slots it
//! supports. Every slot it leaves alone answers 405 with the standard
//! envelope. A request is routed to a slot by its HTTP method and by
//! whether the route captured an `id` parameter:
//!
//! | method | `/items`   | `/items/:id`     |
//! |--------|------------|------------------|
//! | GET    | `get`      | `get_by_id`      |
//! | POST   | `post`     | 405              |
//! | PUT    | `put`      | `put_by_id`      |
//! | PATCH  | `patch`    | `patch_by_id`    |
//! | DELETE | `delete`   | `delete_by_id`   |
//!
//! Any other method is answered with 405.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use restkit_server::{api::response::Reply, context::RequestContext, error::RestResult};
//! use restkit_server::rest::RestHandlers;
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl RestHandlers for Ping {
//!     async fn get(&self, _ctx: &mut RequestContext) -> RestResult {
//!         Ok(Reply::success("pong"))
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use axum::http::Method;

use crate::api::response::Reply;
use crate::context::RequestContext;
use crate::error::RestResult;

/// Route parameter that selects item handlers
pub const ID_PARAM: &str = "id";

/// Handler slots of a REST resource
#[allow(unused_variables)]
#[async_trait]
pub trait RestHandlers: Send + Sync + 'static {
    /// `GET /resource`
    async fn get(&self, ctx: &mut RequestContext) -> RestResult {
        Ok(Reply::method_not_allowed())
    }

    /// `GET /resource/:id`
    async fn get_by_id(&self, ctx: &mut RequestContext, id: &str) -> RestResult {
        Ok(Reply::method_not_allowed())
    }

    /// `POST /resource`
    async fn post(&self, ctx: &mut RequestContext) -> RestResult {
        Ok(Reply::method_not_allowed())
    }

    /// `PUT /resource`
    async fn put(&self, ctx: &mut RequestContext) -> RestResult {
        Ok(Reply::method_not_allowed())
    }

    /// `PUT /resource/:id`
    async fn put_by_id(&self, ctx: &mut RequestContext, id: &str) -> RestResult {
        Ok(Reply::method_not_allowed())
    }

    /// `PATCH /resource`
    async fn patch(&self, ctx: &mut RequestContext) -> RestResult {
        Ok(Reply::method_not_allowed())
    }

    /// `PATCH /resource/:id`
    async fn patch_by_id(&self, ctx: &mut RequestContext, id: &str) -> RestResult {
        Ok(Reply::method_not_allowed())
    }

    /// `DELETE /resource`
    async fn delete(&self, ctx: &mut RequestContext) -> RestResult {
        Ok(Reply::method_not_allowed())
    }

    /// `DELETE /resource/:id`
    async fn delete_by_id(&self, ctx: &mut RequestContext, id: &str) -> RestResult {
        Ok(Reply::method_not_allowed())
    }
}

/// Collection or single item, decided by the `id` route parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Collection,
    Item(String),
}

impl Target {
    /// An `id` parameter that is present but empty counts as absent
    pub fn classify(params: &HashMap<String, String>) -> Self {
        match params.get(ID_PARAM) {
            Some(id) if !id.is_empty() => Self::Item(id.clone()),
            _ => Self::Collection,
        }
    }
}

/// The handler slot a request resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Get,
    GetById,
    Post,
    Put,
    PutById,
    Patch,
    PatchById,
    Delete,
    DeleteById,
}

impl Slot {
    /// `None` means the combination has no slot and is answered with 405
    pub fn select(method: &Method, target: &Target) -> Option<Self> {
        let item = matches!(target, Target::Item(_));
        let slot = match *method {
            Method::GET if item => Self::GetById,
            Method::GET => Self::Get,
            Method::POST if item => return None,
            Method::POST => Self::Post,
            Method::PUT if item => Self::PutById,
            Method::PUT => Self::Put,
            Method::PATCH if item => Self::PatchById,
            Method::PATCH => Self::Patch,
            Method::DELETE if item => Self::DeleteById,
            Method::DELETE => Self::Delete,
            _ => return None,
        };
        Some(slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::GetById => "get_by_id",
            Self::Post => "post",
            Self::Put => "put",
            Self::PutById => "put_by_id",
            Self::Patch => "patch",
            Self::PatchById => "patch_by_id",
            Self::Delete => "delete",
            Self::DeleteById => "delete_by_id",
        };
        f.write_str(name)
    }
}

/// Route one request to `resource` and turn the outcome into a reply
///
/// Handler errors are mapped onto the envelope here; panics are caught by
/// the caller in [`crate::router`].
pub async fn dispatch<R>(resource: &R, ctx: &mut RequestContext) -> Reply
where
    R: RestHandlers + ?Sized,
{
    let target = Target::classify(ctx.params());
    let Some(slot) = Slot::select(ctx.method(), &target) else {
        tracing::debug!(method = %ctx.method(), path = ctx.path(), "No handler slot for request");
        return Reply::method_not_allowed();
    };

    let id = match &target {
        Target::Item(id) => id.as_str(),
        Target::Collection => "",
    };

    tracing::debug!(%slot, path = ctx.path(), "Dispatching request");

    let result = match slot {
        Slot::Get => resource.get(ctx).await,
        Slot::GetById => resource.get_by_id(ctx, id).await,
        Slot::Post => resource.post(ctx).await,
        Slot::Put => resource.put(ctx).await,
        Slot::PutById => resource.put_by_id(ctx, id).await,
        Slot::Patch => resource.patch(ctx).await,
        Slot::PatchById => resource.patch_by_id(ctx, id).await,
        Slot::Delete => resource.delete(ctx).await,
        Slot::DeleteById => resource.delete_by_id(ctx, id).await,
    };

    result.unwrap_or_else(|err| {
        tracing::debug!(%slot, error = %err, "Handler returned an error");
        Reply::from(err)
    })
}
