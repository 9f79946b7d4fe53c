//! Audit record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use crate::api::response::Reply;
use crate::context::RequestContext;

/// Which stream a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    /// Incoming request, written before the handler runs
    Request,
    /// Successful or client-visible non-error reply
    Response,
    /// Reply with a 4xx or 5xx status
    Error,
}

impl AuditCategory {
    pub const ALL: [AuditCategory; 3] = [Self::Request, Self::Response, Self::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured audit line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl AuditRecord {
    pub fn new(
        category: AuditCategory,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            request_id: None,
            method: method.into(),
            path: path.into(),
            status: None,
            message: None,
            data: None,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Record for the reply produced while serving `ctx`
    pub fn for_reply(ctx: &RequestContext, reply: &Reply) -> Self {
        let category = if reply.is_error() {
            AuditCategory::Error
        } else {
            AuditCategory::Response
        };

        let mut record = Self::new(category, ctx.method().as_str(), ctx.path())
            .with_reply(reply);
        record.request_id = Some(ctx.request_id());
        record.user_agent = ctx.header("user-agent").map(str::to_owned);
        record
    }

    pub fn with_reply(mut self, reply: &Reply) -> Self {
        self.status = Some(reply.status().as_u16());
        self.message = Some(reply.message().to_string());
        self.data = reply.data().cloned();
        self
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}
