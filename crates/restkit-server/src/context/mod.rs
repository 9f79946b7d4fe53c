//! Per-request context and its reuse pool
//!
//! A [`RequestContext`] carries everything a handler may read about the
//! request it is serving: method, URI, headers, route parameters and the
//! collected body. Contexts are checked out of a [`ContextPool`] for the
//! duration of one request and go back when the [`PooledContext`] guard is
//! dropped, whether the handler returned, failed, or panicked.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::api::response::Reply;
use crate::form::{self, FormError, UploadedFile};
use crate::query::{QueryParameters, QueryRules, QueryValidationError};

/// Idle contexts kept around when no limit is configured
pub const DEFAULT_MAX_IDLE: usize = 256;

/// Parts of an incoming request bound to a context at checkout
#[derive(Debug, Default)]
pub struct Inbound {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: HashMap<String, String>,
    pub body: Bytes,
}

/// Status and message of the reply a context produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    #[serde(with = "status_code")]
    pub status: StatusCode,
    pub message: String,
}

mod status_code {
    use axum::http::StatusCode;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(status.as_u16())
    }
}

/// Request state handed to handlers
#[derive(Debug)]
pub struct RequestContext {
    request_id: Uuid,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    body: Bytes,
    rules: Arc<QueryRules>,
    outcome: Option<Outcome>,
}

impl RequestContext {
    fn empty(rules: Arc<QueryRules>) -> Self {
        Self {
            request_id: Uuid::nil(),
            method: Method::GET,
            uri: Uri::default(),
            headers: HeaderMap::new(),
            params: HashMap::new(),
            body: Bytes::new(),
            rules,
            outcome: None,
        }
    }

    /// Standalone context outside any pool
    pub fn new(inbound: Inbound, rules: Arc<QueryRules>) -> Self {
        let mut ctx = Self::empty(rules.clone());
        ctx.bind(inbound, rules);
        ctx
    }

    /// Overwrite every field from the new request
    fn bind(&mut self, inbound: Inbound, rules: Arc<QueryRules>) {
        self.request_id = Uuid::new_v4();
        self.method = inbound.method;
        self.uri = inbound.uri;
        self.headers = inbound.headers;
        self.params = inbound.params;
        self.body = inbound.body;
        self.rules = rules;
        self.outcome = None;
    }

    /// Drop request data so nothing outlives the request in the pool
    fn reset(&mut self) {
        self.request_id = Uuid::nil();
        self.method = Method::GET;
        self.uri = Uri::default();
        self.headers.clear();
        self.params.clear();
        self.body = Bytes::new();
        self.outcome = None;
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Route parameter captured by the path pattern
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode and validate the list parameters in the query string
    pub fn query(&self) -> Result<QueryParameters, QueryValidationError> {
        let params = self.raw_query();
        params.validate(&self.rules)?;
        Ok(params)
    }

    /// Decode the list parameters without validating them
    pub fn raw_query(&self) -> QueryParameters {
        QueryParameters::from_query_str(self.uri.query().unwrap_or_default())
    }

    /// Decode the body according to its content type
    pub async fn form<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        form::form(&self.headers, &self.body).await
    }

    pub async fn form_file(&self, field: &str) -> Result<Option<UploadedFile>, FormError> {
        form::form_file(&self.headers, &self.body, field).await
    }

    pub async fn post_form_value(&self, key: &str) -> Result<Option<String>, FormError> {
        form::post_form_value(&self.headers, &self.body, key).await
    }

    pub async fn post_form_values(&self, key: &str) -> Result<Vec<String>, FormError> {
        form::post_form_values(&self.headers, &self.body, key).await
    }

    /// Remember the reply produced for this request
    pub fn record(&mut self, reply: &Reply) {
        self.outcome = Some(Outcome {
            status: reply.status(),
            message: reply.message().to_string(),
        });
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }
}

/// Counters exposed for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub idle: usize,
    pub in_use: u64,
    pub created: u64,
    pub reused: u64,
}

/// Bounded pool of reusable request contexts
#[derive(Debug)]
pub struct ContextPool {
    idle: Mutex<Vec<RequestContext>>,
    max_idle: usize,
    enabled: bool,
    created: AtomicU64,
    reused: AtomicU64,
    in_use: AtomicU64,
}

impl ContextPool {
    pub fn new(max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            enabled: true,
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            in_use: AtomicU64::new(0),
        })
    }

    /// Pool that allocates a fresh context for every request
    pub fn disabled() -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::new()),
            max_idle: 0,
            enabled: false,
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            in_use: AtomicU64::new(0),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check out a context bound to `inbound`
    pub fn acquire(self: &Arc<Self>, inbound: Inbound, rules: Arc<QueryRules>) -> PooledContext {
        let recycled = if self.enabled { self.idle.lock().pop() } else { None };

        let ctx = match recycled {
            Some(mut ctx) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                ctx.bind(inbound, rules);
                ctx
            },
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                RequestContext::new(inbound, rules)
            },
        };
        self.in_use.fetch_add(1, Ordering::Relaxed);

        PooledContext {
            ctx: Some(ctx),
            pool: Arc::clone(self),
        }
    }

    fn release(&self, mut ctx: RequestContext) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        if !self.enabled {
            return;
        }
        ctx.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(ctx);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.lock().len(),
            in_use: self.in_use.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        }
    }
}

/// Checked-out context; returns to its pool on drop
#[derive(Debug)]
pub struct PooledContext {
    ctx: Option<RequestContext>,
    pool: Arc<ContextPool>,
}

impl Deref for PooledContext {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        // Only `Drop` takes the context out.
        self.ctx
            .as_ref()
            .unwrap_or_else(|| unreachable!("context taken before drop"))
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut RequestContext {
        self.ctx
            .as_mut()
            .unwrap_or_else(|| unreachable!("context taken before drop"))
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
