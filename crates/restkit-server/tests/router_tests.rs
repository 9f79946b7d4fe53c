//! Integration tests for the route table and dispatcher
//!
//! These tests verify:
//! - Method and `id` parameter select the right resource slot
//! - Unknown paths and unsupported methods answer with the envelope
//! - Errors and panics become replies and the context is always released
//! - Exactly one audit record is written per dispatched request

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;

use restkit_server::{
    audit::{AuditCategory, AuditRecord, AuditSink},
    context::ContextPool,
    error::AppError,
    pagination::PageWindow,
    query::QueryRules,
    Dispatcher, Reply, RequestContext, RestHandlers, RestResult, Routes,
};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingSink {
    fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, record: &AuditRecord) {
        self.records.lock().push(record.clone());
    }
}

#[derive(Debug, Deserialize)]
struct NewNote {
    text: String,
}

/// In-memory resource supporting list, create, read and delete
#[derive(Default)]
struct Notes {
    next_id: AtomicU64,
    notes: Mutex<BTreeMap<u64, String>>,
}

impl Notes {
    fn seeded(texts: &[&str]) -> Self {
        let notes = Self::default();
        for text in texts {
            notes.insert(text.to_string());
        }
        notes
    }

    fn insert(&self, text: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.notes.lock().insert(id, text);
        id
    }
}

fn note_id(raw: &str) -> Result<u64, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid note id '{}'", raw)))
}

#[async_trait]
impl RestHandlers for Notes {
    async fn get(&self, ctx: &mut RequestContext) -> RestResult {
        let params = ctx.query()?;
        let window = PageWindow::resolve(&params);
        let keyword = params.keyword.clone().unwrap_or_default();

        let list: Vec<Value> = self
            .notes
            .lock()
            .iter()
            .filter(|(_, text)| text.contains(&keyword))
            .skip(window.offset() as usize)
            .take(window.limit() as usize)
            .map(|(id, text)| json!({ "id": id, "text": text }))
            .collect();

        Ok(Reply::success(json!({ "list": list, "page": window.page })))
    }

    async fn get_by_id(&self, _ctx: &mut RequestContext, id: &str) -> RestResult {
        let id = note_id(id)?;
        match self.notes.lock().get(&id) {
            Some(text) => Ok(Reply::success(json!({ "id": id, "text": text }))),
            None => Ok(Reply::record_not_found()),
        }
    }

    async fn post(&self, ctx: &mut RequestContext) -> RestResult {
        let note: NewNote = ctx.form().await?;
        let id = self.insert(note.text.clone());
        Ok(Reply::created(json!({ "id": id, "text": note.text })))
    }

    async fn delete_by_id(&self, _ctx: &mut RequestContext, id: &str) -> RestResult {
        let id = note_id(id)?;
        match self.notes.lock().remove(&id) {
            Some(_) => Ok(Reply::no_content()),
            None => Ok(Reply::record_not_found()),
        }
    }
}

struct Exploding;

#[async_trait]
impl RestHandlers for Exploding {
    async fn get(&self, _ctx: &mut RequestContext) -> RestResult {
        panic!("handler blew up");
    }

    async fn put(&self, _ctx: &mut RequestContext) -> RestResult {
        Err(AppError::internal("storage offline"))
    }
}

fn ping(ctx: &mut RequestContext) -> BoxFuture<'_, RestResult> {
    Box::pin(async move {
        Ok(Reply::success(json!({
            "method": ctx.method().as_str(),
            "path": ctx.path(),
        })))
    })
}

struct TestApp {
    router: Router,
    pool: Arc<ContextPool>,
    audit: Arc<RecordingSink>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_dispatcher(|dispatcher| dispatcher)
    }

    fn with_dispatcher(configure: impl FnOnce(Dispatcher) -> Dispatcher) -> Self {
        let pool = ContextPool::new(8);
        let audit = Arc::new(RecordingSink::default());
        let dispatcher = configure(Dispatcher::new(
            pool.clone(),
            QueryRules::default(),
            audit.clone(),
        ));

        let router = Routes::new()
            .rest("/notes", Notes::seeded(&["alpha", "beta", "alphabet"]))
            .rest("/exploding", Exploding)
            .get("/ping", ping)
            .into_router(dispatcher);

        Self {
            router,
            pool,
            audit,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn call(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = self
            .send(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await;
        split(response).await
    }
}

async fn split(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// ============================================================================
// Slot selection
// ============================================================================

#[tokio::test]
async fn test_collection_get_lists_notes() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/notes").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK");
    assert_eq!(body["data"]["list"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["page"], 1);
}

#[tokio::test]
async fn test_list_honours_keyword_and_paging() {
    let app = TestApp::new();

    let (status, body) = app
        .call(Method::GET, "/notes?keyword=alpha&items_per_page=1&page=2")
        .await;

    assert_eq!(status, StatusCode::OK);
    let list = body["data"]["list"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["text"], "alphabet");
}

#[tokio::test]
async fn test_item_get_uses_id_param() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/notes/2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "id": 2, "text": "beta" }));
}

#[tokio::test]
async fn test_missing_record_is_200_not_found() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/notes/99").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Not found");
    assert_eq!(body["data"]["description"], "Not found");
}

#[tokio::test]
async fn test_post_json_creates_note() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/notes")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"text":"gamma"}"#))
                .unwrap(),
        )
        .await;
    let (status, body) = split(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Created");
    assert_eq!(body["data"], json!({ "id": 4, "text": "gamma" }));

    let (_, body) = app.call(Method::GET, "/notes/4").await;
    assert_eq!(body["data"]["text"], "gamma");
}

#[tokio::test]
async fn test_post_urlencoded_creates_note() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/notes")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("text=hello+world"))
                .unwrap(),
        )
        .await;
    let (status, body) = split(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["text"], "hello world");
}

#[tokio::test]
async fn test_post_without_content_type_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/notes")
                .body(Body::from("text=x"))
                .unwrap(),
        )
        .await;
    let (status, body) = split(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Bad request");
    assert_eq!(body["data"]["description"], "Invalid content type");
}

#[tokio::test]
async fn test_delete_returns_empty_204() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .method(Method::DELETE)
                .uri("/notes/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes();
    assert!(bytes.is_empty());

    let (_, body) = app.call(Method::GET, "/notes/1").await;
    assert_eq!(body["message"], "Not found");
}

// ============================================================================
// 404 and 405
// ============================================================================

#[tokio::test]
async fn test_unimplemented_slots_answer_405() {
    let app = TestApp::new();

    for (method, uri) in [
        (Method::PUT, "/notes"),
        (Method::PATCH, "/notes/1"),
        (Method::DELETE, "/notes"),
        (Method::POST, "/notes/1"),
        (Method::HEAD, "/notes"),
        (Method::OPTIONS, "/notes/1"),
    ] {
        let (status, body) = app.call(method.clone(), uri).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
        if method != Method::HEAD {
            assert_eq!(body["message"], "Method not allowed");
            assert_eq!(body["data"], Value::Null);
        }
    }
}

#[tokio::test]
async fn test_unregistered_method_on_plain_route_is_405() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "method": "GET", "path": "/ping" }));

    let (status, body) = app.call(Method::DELETE, "/ping").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["message"], "Method not allowed");
}

#[tokio::test]
async fn test_unknown_path_is_404_and_audited() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/nowhere").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "Page not found", "data": null }));

    let records = app.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].category, AuditCategory::Error);
    assert_eq!(records[0].status, Some(404));
    assert_eq!(records[0].path, "/nowhere");
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_invalid_query_returns_field_map() {
    let app = TestApp::new();

    let (status, body) = app
        .call(Method::GET, "/notes?keyword=drop%3Btable&items_per_page=ten")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Bad request");
    assert_eq!(
        body["data"],
        json!({
            "items_per_page": "must be a number",
            "keyword": "must contain only letters, digits, spaces and dots",
        })
    );
}

#[tokio::test]
async fn test_custom_keyword_pattern() {
    let rules = QueryRules::with_keyword_pattern(r"^[a-z;]+$").unwrap();
    let audit = Arc::new(RecordingSink::default());
    let router = Routes::new()
        .rest("/notes", Notes::seeded(&["a;b"]))
        .into_router(Dispatcher::new(ContextPool::new(1), rules, audit));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/notes?keyword=a%3Bb")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, body) = split(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["list"][0]["text"], "a;b");
}

#[tokio::test]
async fn test_handler_error_is_500_envelope() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::PUT, "/exploding").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn test_panic_is_500_and_context_released() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/exploding").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");

    let stats = app.pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.idle, 1);

    let records = app.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].category, AuditCategory::Error);
    assert_eq!(records[0].status, Some(500));

    // The server keeps serving after a panic
    let (status, _) = app.call(Method::GET, "/notes").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = TestApp::with_dispatcher(|dispatcher| dispatcher.with_body_limit(16));

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/notes")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(r#"{{"text":"{}"}}"#, "x".repeat(64))))
                .unwrap(),
        )
        .await;
    let (status, body) = split(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Bad request");

    // Rejected before a context was checked out
    assert_eq!(app.pool.stats().created, 0);
    assert_eq!(app.audit.records().len(), 1);
}

// ============================================================================
// Audit and pooling
// ============================================================================

#[tokio::test]
async fn test_one_audit_record_per_request() {
    let app = TestApp::new();

    app.call(Method::GET, "/notes").await;
    app.call(Method::GET, "/notes/1").await;
    app.call(Method::PUT, "/notes").await;

    let records = app.audit.records();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].category, AuditCategory::Response);
    assert_eq!(records[0].method, "GET");
    assert_eq!(records[0].path, "/notes");
    assert_eq!(records[0].message.as_deref(), Some("OK"));
    assert!(records[0].request_id.is_some());

    assert_eq!(records[1].path, "/notes/1");
    assert_eq!(records[2].category, AuditCategory::Error);
    assert_eq!(records[2].status, Some(405));

    // Every request got its own id
    assert_ne!(records[0].request_id, records[1].request_id);
}

#[tokio::test]
async fn test_contexts_are_reused() {
    let app = TestApp::new();

    for _ in 0..3 {
        let (status, _) = app.call(Method::GET, "/ping").await;
        assert_eq!(status, StatusCode::OK);
    }

    let stats = app.pool.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 2);
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.idle, 1);
}

#[tokio::test]
async fn test_disabled_pool_allocates_per_request() {
    let pool = ContextPool::disabled();
    let router = Routes::new().get("/ping", ping).into_router(Dispatcher::new(
        pool.clone(),
        QueryRules::default(),
        Arc::new(RecordingSink::default()),
    ));

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let stats = pool.stats();
    assert_eq!(stats.created, 2);
    assert_eq!(stats.reused, 0);
    assert_eq!(stats.idle, 0);
}

#[tokio::test]
async fn test_reused_context_does_not_leak_previous_request() {
    let app = TestApp::new();

    app.call(Method::GET, "/notes/3").await;
    let (status, body) = app.call(Method::GET, "/ping").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["path"], "/ping");
    assert_eq!(app.pool.stats().reused, 1);
}
