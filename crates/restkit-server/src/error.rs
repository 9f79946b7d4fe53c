//! Server-specific error types
//!
//! Handlers return `Result<Reply, AppError>`. Every error maps onto the
//! standard envelope; internal details are logged and never sent to the
//! client.

use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::api::response::Reply;
use crate::db::registry::RegistryError;
use crate::db::DbError;
use crate::form::FormError;
use crate::query::QueryValidationError;

/// Result type returned by resource and route handlers
pub type RestResult = Result<Reply, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid query parameters: {0}")]
    Query(#[from] QueryValidationError),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not implemented")]
    NotImplemented,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<AppError> for Reply {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Query(errors) => Reply::bad_request(errors),
            AppError::Form(e) => Reply::bad_request(json!({ "description": e.to_string() })),
            AppError::BadRequest(message) => Reply::bad_request(json!({ "description": message })),
            AppError::Unauthorized(message) => Reply::unauthorized(Some(message)),
            AppError::Forbidden(message) => Reply::forbidden(Some(message)),
            AppError::NotImplemented => Reply::not_implemented(),
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                Reply::internal_server_error(Some("A database error occurred".to_string()))
            },
            AppError::Db(ref e) => {
                tracing::error!("Database error: {:?}", e);
                Reply::internal_server_error(Some("A database error occurred".to_string()))
            },
            AppError::Registry(ref e) => {
                tracing::error!("Connection registry error: {}", e);
                Reply::internal_server_error(Some("Server configuration error".to_string()))
            },
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                Reply::internal_server_error(None)
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Reply::from(self).into_response()
    }
}
