//! Route table and request dispatcher
//!
//! [`Routes`] collects path registrations: single-method handlers added
//! with [`Routes::get`] and friends, and REST resources added with
//! [`Routes::rest`]. [`Routes::into_router`] turns the table into an axum
//! [`Router`] in which every request flows through the [`Dispatcher`]:
//!
//! 1. collect the body up to the configured limit
//! 2. check a context out of the pool and bind the request to it
//! 3. run the handler, catching errors and panics
//! 4. write exactly one audit record for the reply
//! 5. return the context to the pool and send the reply
//!
//! Unknown paths answer 404 and known paths with an unregistered method
//! answer 405, both with the standard envelope.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, Request},
    http::Method,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use futures::{future::BoxFuture, FutureExt};
use serde_json::json;

use crate::api::response::Reply;
use crate::audit::{AuditCategory, AuditRecord, AuditSink, TracingAuditSink};
use crate::context::{ContextPool, Inbound, RequestContext, DEFAULT_MAX_IDLE};
use crate::error::RestResult;
use crate::query::QueryRules;
use crate::rest::{dispatch, RestHandlers, ID_PARAM};

/// Default cap on collected request bodies
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Handler bound to a single path and method
#[async_trait]
pub trait ContextHandler: Send + Sync + 'static {
    async fn call(&self, ctx: &mut RequestContext) -> RestResult;
}

/// Plain functions of the shape
/// `fn(&mut RequestContext) -> BoxFuture<'_, RestResult>` are handlers.
#[async_trait]
impl<F> ContextHandler for F
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, RestResult> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut RequestContext) -> RestResult {
        (self)(ctx).await
    }
}

#[derive(Clone)]
enum Endpoint {
    Methods(HashMap<Method, Arc<dyn ContextHandler>>),
    Resource(Arc<dyn RestHandlers>),
}

impl Endpoint {
    async fn handle(&self, ctx: &mut RequestContext) -> Reply {
        match self {
            Self::Resource(resource) => dispatch(resource.as_ref(), ctx).await,
            Self::Methods(handlers) => {
                let Some(handler) = handlers.get(ctx.method()).cloned() else {
                    return Reply::method_not_allowed();
                };
                handler.call(ctx).await.unwrap_or_else(Reply::from)
            },
        }
    }
}

/// Route table built before the server starts
///
/// Registering the same path and method twice keeps the later handler.
/// Registering a resource on a path replaces any method handlers there.
#[derive(Clone, Default)]
pub struct Routes {
    table: BTreeMap<String, Endpoint>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<H: ContextHandler>(self, path: &str, handler: H) -> Self {
        self.method(Method::GET, path, handler)
    }

    pub fn post<H: ContextHandler>(self, path: &str, handler: H) -> Self {
        self.method(Method::POST, path, handler)
    }

    pub fn put<H: ContextHandler>(self, path: &str, handler: H) -> Self {
        self.method(Method::PUT, path, handler)
    }

    pub fn patch<H: ContextHandler>(self, path: &str, handler: H) -> Self {
        self.method(Method::PATCH, path, handler)
    }

    pub fn delete<H: ContextHandler>(self, path: &str, handler: H) -> Self {
        self.method(Method::DELETE, path, handler)
    }

    /// Register `handler` for `method` on `path`
    pub fn method<H: ContextHandler>(mut self, method: Method, path: &str, handler: H) -> Self {
        let path = normalize(path);
        let handler: Arc<dyn ContextHandler> = Arc::new(handler);

        match self.table.get_mut(&path) {
            Some(Endpoint::Methods(handlers)) => {
                if handlers.insert(method.clone(), handler).is_some() {
                    tracing::warn!(%method, path = %path, "Replacing existing route handler");
                }
            },
            _ => {
                let mut handlers = HashMap::new();
                handlers.insert(method, handler);
                self.table.insert(path, Endpoint::Methods(handlers));
            },
        }
        self
    }

    /// Register a resource on `path` and `path/:id`
    pub fn rest<R: RestHandlers>(self, path: &str, resource: R) -> Self {
        self.rest_shared(path, Arc::new(resource))
    }

    /// Same as [`Routes::rest`] for an already shared resource
    pub fn rest_shared(mut self, path: &str, resource: Arc<dyn RestHandlers>) -> Self {
        let collection = normalize(path);
        let item = join(&collection, &format!("/:{}", ID_PARAM));

        for path in [collection, item] {
            if self.table.contains_key(&path) {
                tracing::warn!(path = %path, "Replacing existing route with resource");
            }
            self.table.insert(path, Endpoint::Resource(resource.clone()));
        }
        self
    }

    /// Mount every route of `other` under `prefix`
    pub fn nest(mut self, prefix: &str, other: Routes) -> Self {
        let prefix = normalize(prefix);
        for (path, endpoint) in other.table {
            self.table.insert(join(&prefix, &path), endpoint);
        }
        self
    }

    /// Registered paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Build the axum router with every route served through `dispatcher`
    pub fn into_router(self, dispatcher: Dispatcher) -> Router {
        let dispatcher = Arc::new(dispatcher);
        let mut router = Router::new();

        for (path, endpoint) in self.table {
            tracing::debug!(path = %path, "Mounting route");
            let endpoint = Arc::new(endpoint);
            let dispatcher = dispatcher.clone();

            router = router.route(
                &path,
                any(
                    move |params: Option<Path<HashMap<String, String>>>, request: Request| {
                        let endpoint = endpoint.clone();
                        let dispatcher = dispatcher.clone();
                        async move {
                            let params = params.map(|Path(p)| p).unwrap_or_default();
                            dispatcher.serve(&endpoint, params, request).await
                        }
                    },
                ),
            );
        }

        router.fallback(move |request: Request| {
            let dispatcher = dispatcher.clone();
            async move {
                dispatcher.not_found(&request);
                Reply::page_not_found()
            }
        })
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}

fn join(prefix: &str, path: &str) -> String {
    match (prefix, path) {
        ("/", path) => normalize(path),
        (prefix, "/") => normalize(prefix),
        (prefix, path) => normalize(&format!("{}/{}", prefix, path.trim_start_matches('/'))),
    }
}

/// Shared per-request machinery used by every route
pub struct Dispatcher {
    pool: Arc<ContextPool>,
    rules: Arc<QueryRules>,
    audit: Arc<dyn AuditSink>,
    body_limit: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(
            ContextPool::new(DEFAULT_MAX_IDLE),
            QueryRules::default(),
            Arc::new(TracingAuditSink),
        )
    }
}

impl Dispatcher {
    pub fn new(pool: Arc<ContextPool>, rules: QueryRules, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            pool,
            rules: Arc::new(rules),
            audit,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn pool(&self) -> &Arc<ContextPool> {
        &self.pool
    }

    async fn serve(
        &self,
        endpoint: &Endpoint,
        params: HashMap<String, String>,
        request: Request,
    ) -> Response {
        let (parts, body) = request.into_parts();

        let body = match axum::body::to_bytes(body, self.body_limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    method = %parts.method,
                    path = parts.uri.path(),
                    error = %e,
                    "Failed to read request body"
                );
                let reply = Reply::bad_request(json!({
                    "description": "Request body is unreadable or exceeds the size limit"
                }));
                let record = AuditRecord::new(
                    AuditCategory::Error,
                    parts.method.as_str(),
                    parts.uri.path(),
                )
                .with_reply(&reply);
                self.audit.record(&record);
                return reply.into_response();
            },
        };

        let mut ctx = self.pool.acquire(
            Inbound {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                params,
                body,
            },
            self.rules.clone(),
        );

        let reply = match AssertUnwindSafe(endpoint.handle(&mut ctx)).catch_unwind().await {
            Ok(reply) => reply,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    request_id = %ctx.request_id(),
                    method = %ctx.method(),
                    path = ctx.path(),
                    panic = %detail,
                    "Handler panicked"
                );
                Reply::internal_server_error(None)
            },
        };

        ctx.record(&reply);
        self.audit.record(&AuditRecord::for_reply(&ctx, &reply));
        drop(ctx);

        reply.into_response()
    }

    fn not_found(&self, request: &Request) {
        let record = AuditRecord::new(
            AuditCategory::Error,
            request.method().as_str(),
            request.uri().path(),
        )
        .with_reply(&Reply::page_not_found());
        self.audit.record(&record);
    }
}
