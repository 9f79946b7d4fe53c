//! Response envelope
//!
//! Every response produced by restkit, success or failure, has the same wire
//! shape:
//!
//! ```json
//! { "message": "OK", "data": { ... } }
//! ```
//!
//! `data` is `null` when there is no payload. Clients tell outcomes apart by
//! the status code and the `message` string; there is no separate error
//! format.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Standard message vocabulary and the status code each one carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    Ok,
    Created,
    Accepted,
    NoContent,
    BadRequest,
    Unauthorized,
    Forbidden,
    /// A record is missing from an otherwise valid collection
    NotFound,
    PageNotFound,
    MethodNotAllowed,
    NotImplemented,
    InternalServerError,
    Updated,
    Deleted,
}

impl Message {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::Accepted => "Accepted",
            Self::NoContent => "No-content",
            Self::BadRequest => "Bad request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not found",
            Self::PageNotFound => "Page not found",
            Self::MethodNotAllowed => "Method not allowed",
            Self::NotImplemented => "Not implemented",
            Self::InternalServerError => "Internal server error",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        }
    }

    /// Status code sent with this message.
    ///
    /// `NotFound` is deliberately 200: a lookup that finds nothing is a
    /// successful request. Use `PageNotFound` for unknown routes.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Ok | Self::NotFound | Self::Updated | Self::Deleted => StatusCode::OK,
            Self::Created => StatusCode::CREATED,
            Self::Accepted => StatusCode::ACCEPTED,
            Self::NoContent => StatusCode::NO_CONTENT,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PageNotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON body of every response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message: String,
    pub data: Option<Value>,
}

/// A status code paired with its envelope
///
/// Handlers build one of these through the named constructors; the
/// transport turns it into an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: StatusCode,
    envelope: Envelope,
}

impl Reply {
    /// Custom message, payload, and status
    pub fn write<T: Serialize>(message: impl Into<String>, data: T, status: StatusCode) -> Self {
        match serde_json::to_value(data) {
            Ok(Value::Null) => Self::bare(message, status),
            Ok(value) => Self {
                status,
                envelope: Envelope {
                    message: message.into(),
                    data: Some(value),
                },
            },
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize response payload");
                Self::internal_server_error(None)
            },
        }
    }

    fn bare(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            status,
            envelope: Envelope {
                message: message.into(),
                data: None,
            },
        }
    }

    fn with<T: Serialize>(message: Message, data: T) -> Self {
        Self::write(message.as_str(), data, message.status())
    }

    fn empty(message: Message) -> Self {
        Self::bare(message.as_str(), message.status())
    }

    fn described(message: Message, description: Option<String>) -> Self {
        match description {
            Some(description) => Self::with(message, json!({ "description": description })),
            None => Self::empty(message),
        }
    }

    /// 200 with payload
    pub fn success<T: Serialize>(data: T) -> Self {
        Self::with(Message::Ok, data)
    }

    /// 201 with the created resource
    pub fn created<T: Serialize>(data: T) -> Self {
        Self::with(Message::Created, data)
    }

    /// 202 with payload
    pub fn accepted<T: Serialize>(data: T) -> Self {
        Self::with(Message::Accepted, data)
    }

    /// 200 "Updated" with the updated resource
    pub fn updated<T: Serialize>(data: T) -> Self {
        Self::with(Message::Updated, data)
    }

    /// 200 "Deleted" with whatever identifies the removed resource
    pub fn deleted<T: Serialize>(data: T) -> Self {
        Self::with(Message::Deleted, data)
    }

    /// 204, serialized without a body
    pub fn no_content() -> Self {
        Self::empty(Message::NoContent)
    }

    /// 400 with a payload describing what was wrong
    pub fn bad_request<T: Serialize>(data: T) -> Self {
        Self::with(Message::BadRequest, data)
    }

    /// 200 "Not found": the request was fine but no record matched
    pub fn record_not_found() -> Self {
        Self::described(Message::NotFound, Some(Message::NotFound.as_str().to_string()))
    }

    /// 404 "Page not found"
    pub fn page_not_found() -> Self {
        Self::empty(Message::PageNotFound)
    }

    pub fn unauthorized(description: Option<String>) -> Self {
        Self::described(Message::Unauthorized, description)
    }

    pub fn forbidden(description: Option<String>) -> Self {
        Self::described(Message::Forbidden, description)
    }

    /// 405 without payload
    pub fn method_not_allowed() -> Self {
        Self::empty(Message::MethodNotAllowed)
    }

    /// 501 "Not implemented"
    pub fn not_implemented() -> Self {
        Self::described(
            Message::NotImplemented,
            Some(Message::NotImplemented.as_str().to_string()),
        )
    }

    pub fn internal_server_error(description: Option<String>) -> Self {
        Self::described(Message::InternalServerError, description)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.envelope.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.envelope.data.as_ref()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Client or server failure
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        if self.status == StatusCode::NO_CONTENT {
            return self.status.into_response();
        }
        (self.status, Json(self.envelope)).into_response()
    }
}
