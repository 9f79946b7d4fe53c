//! Restkit Server Library
//!
//! Building blocks for JSON REST services on axum and Postgres.
//!
//! # Overview
//!
//! - **Resources**: implement [`rest::RestHandlers`] and override only the
//!   slots you support; everything else answers 405
//! - **Routing**: [`router::Routes`] maps paths to resources and single
//!   handlers, then builds an axum router
//! - **Request context**: [`context::RequestContext`] values are pooled and
//!   handed to handlers with the request's method, params, headers and body
//! - **Lists**: [`query`] decodes and validates list parameters,
//!   [`pagination`] turns them into paged, date-filtered SQL
//! - **Envelope**: every response is `{"message": ..., "data": ...}`, see
//!   [`api::response`]
//! - **Audit**: one record per request and one per reply, see [`audit`]
//!
//! # Request flow
//!
//! ```text
//! TraceLayer -> CORS -> RequestLogLayer -> Router
//!     -> Dispatcher: collect body, acquire context
//!     -> RestHandlers slot (by method and `id` param)
//!     -> Reply -> audit record -> release context -> JSON envelope
//! ```
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use restkit_server::{
//!     api::response::Reply, context::RequestContext, error::RestResult,
//!     rest::RestHandlers, router::{Dispatcher, Routes},
//! };
//!
//! struct Greetings;
//!
//! #[async_trait]
//! impl RestHandlers for Greetings {
//!     async fn get(&self, _ctx: &mut RequestContext) -> RestResult {
//!         Ok(Reply::success(["hello", "world"]))
//!     }
//!
//!     async fn get_by_id(&self, _ctx: &mut RequestContext, id: &str) -> RestResult {
//!         Ok(Reply::success(format!("hello {}", id)))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Routes::new()
//!         .rest("/greetings", Greetings)
//!         .into_router(Dispatcher::default());
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod audit;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod features;
pub mod form;
pub mod middleware;
pub mod pagination;
pub mod query;
pub mod rest;
pub mod router;

// Re-export commonly used types
pub use api::response::{Message, Reply};
pub use context::RequestContext;
pub use error::{AppError, RestResult};
pub use rest::RestHandlers;
pub use router::{Dispatcher, Routes};
