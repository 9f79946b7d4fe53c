//! Integration tests for the items API
//!
//! Every test gets a fresh database with migrations applied and drives the
//! full application built by `create_app`, middleware included.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use restkit_server::{
    api::{create_app, API_PREFIX},
    audit::TracingAuditSink,
    config::Config,
    db::registry::{ConnectionRegistry, DEFAULT_ALIAS},
};

const ALL_DATES: &str = "start_date=2000-01-01&end_date=2999-12-31";

fn app(pool: PgPool) -> Router {
    let registry = ConnectionRegistry::new();
    registry.register(DEFAULT_ALIAS, pool).unwrap();
    create_app(&Config::default(), &registry, Arc::new(TracingAuditSink)).unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(format!("{}{}", API_PREFIX, path));
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        },
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
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

async fn seed(pool: &PgPool, name: &str, created_at: &str) -> i64 {
    let created_at: DateTime<Utc> = created_at.parse().unwrap();
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO items (name, created_at, updated_at) VALUES ($1, $2, $2) RETURNING id",
    )
    .bind(name)
    .bind(created_at)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_and_get_item(pool: PgPool) -> sqlx::Result<()> {
    let app = app(pool);

    let (status, body) = send(
        &app,
        Method::POST,
        "/items",
        Some(json!({ "name": "  Widget ", "description": "A widget", "quantity": 3 })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Created");
    assert_eq!(body["data"]["name"], "Widget");
    assert_eq!(body["data"]["quantity"], 3);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, Method::GET, &format!("/items/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "A widget");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_rejects_invalid_body(pool: PgPool) -> sqlx::Result<()> {
    let app = app(pool);

    let (status, body) = send(&app, Method::POST, "/items", Some(json!({ "name": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Bad request");
    assert!(body["data"]["description"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/items",
        Some(json!({ "name": "x", "quantity": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_missing_item_is_not_found_message(pool: PgPool) -> sqlx::Result<()> {
    let app = app(pool);

    for method in [Method::GET, Method::DELETE] {
        let (status, body) = send(&app, method, "/items/4242", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Not found");
    }

    let (status, _) = send(&app, Method::GET, "/items/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_replace_and_patch(pool: PgPool) -> sqlx::Result<()> {
    let id = seed(&pool, "Bolt", "2024-03-01T10:00:00Z").await;
    let app = app(pool);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/items/{}", id),
        Some(json!({ "quantity": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Updated");
    assert_eq!(body["data"]["name"], "Bolt");
    assert_eq!(body["data"]["quantity"], 9);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/items/{}", id),
        Some(json!({ "name": "Nut" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Nut");
    assert_eq!(body["data"]["quantity"], 0);

    let (status, _) = send(&app, Method::PATCH, &format!("/items/{}", id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_item(pool: PgPool) -> sqlx::Result<()> {
    let id = seed(&pool, "Gear", "2024-03-01T10:00:00Z").await;
    let app = app(pool.clone());

    let (status, body) = send(&app, Method::DELETE, &format!("/items/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deleted");
    assert_eq!(body["data"]["id"], id);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(&pool)
        .await?;
    assert_eq!(remaining, 0);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_collection_writes_are_not_allowed(pool: PgPool) -> sqlx::Result<()> {
    let app = app(pool);

    for method in [Method::PUT, Method::PATCH, Method::DELETE] {
        let (status, body) = send(&app, method, "/items", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["message"], "Method not allowed");
    }

    let (status, _) = send(&app, Method::POST, "/items/1", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_pages_and_counts(pool: PgPool) -> sqlx::Result<()> {
    for i in 0..25 {
        seed(&pool, &format!("Item {}", i), "2024-03-01T10:00:00Z").await;
    }
    let app = app(pool);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/items?items_per_page=10&page=3&{}", ALL_DATES),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["list"].as_array().unwrap().len(), 5);
    assert_eq!(data["total_items"], 25);
    assert_eq!(data["total_pages"], 3);
    assert_eq!(data["page"], 3);
    assert_eq!(data["items_per_page"], 10);
    assert_eq!(data["start_date"], "2000-01-01");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_keyword_search(pool: PgPool) -> sqlx::Result<()> {
    seed(&pool, "Red widget", "2024-03-01T10:00:00Z").await;
    seed(&pool, "Blue widget", "2024-03-01T10:00:00Z").await;
    seed(&pool, "Green gadget", "2024-03-01T10:00:00Z").await;
    let app = app(pool);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/items?keyword=WIDGET&{}", ALL_DATES),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_items"], 2);
    assert_eq!(body["data"]["keyword"], "WIDGET");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_date_filters(pool: PgPool) -> sqlx::Result<()> {
    seed(&pool, "January", "2024-01-15T12:00:00Z").await;
    seed(&pool, "February", "2024-02-15T12:00:00Z").await;
    seed(&pool, "March", "2024-03-15T12:00:00Z").await;
    let app = app(pool);

    let (_, body) = send(
        &app,
        Method::GET,
        "/items?start_date=2024-02-01&end_date=2024-03-31",
        None,
    )
    .await;
    assert_eq!(body["data"]["total_items"], 2);

    let (_, body) = send(&app, Method::GET, "/items?start_date=2024-01-15", None).await;
    assert_eq!(body["data"]["total_items"], 1);
    assert_eq!(body["data"]["list"][0]["name"], "January");

    // No dates: only items created today
    let (_, body) = send(&app, Method::GET, "/items", None).await;
    assert_eq!(body["data"]["total_items"], 0);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_rejects_invalid_parameters(pool: PgPool) -> sqlx::Result<()> {
    let app = app(pool);

    let (status, body) = send(
        &app,
        Method::GET,
        "/items?page=x&start_date=2024-13-01&keyword=%25",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let data = body["data"].as_object().unwrap();
    assert!(data.contains_key("page"));
    assert!(data.contains_key("start_date"));
    assert!(data.contains_key("keyword"));

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_reports_database(pool: PgPool) -> sqlx::Result<()> {
    let app = app(pool);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["status"], "running");
    assert_eq!(body["data"]["database"], "ok");

    Ok(())
}
