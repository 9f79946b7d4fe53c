//! Request and response audit trail
//!
//! Every request produces one `request` record when it enters the stack
//! and one `response` or `error` record once its reply is known. Records
//! go to an [`AuditSink`]:
//!
//! - [`TracingAuditSink`] emits tracing events on the `restkit::audit` target
//! - [`FileAuditSink`] writes JSON lines into per-category daily files
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::Router;
//! use restkit_server::audit::{RequestLogLayer, TracingAuditSink};
//!
//! let app: Router = Router::new()
//!     .layer(RequestLogLayer::new(Arc::new(TracingAuditSink)));
//! ```

mod middleware;
mod models;
mod sink;

use std::sync::Arc;

pub use middleware::{RequestLogLayer, RequestLogMiddleware};
pub use models::{AuditCategory, AuditRecord};
pub use sink::{AuditSink, FileAuditSink, TracingAuditSink};

use crate::config::{AuditConfig, AuditSinkKind};

/// Build the sink selected in configuration
pub fn sink_from_config(config: &AuditConfig) -> restkit_common::Result<Arc<dyn AuditSink>> {
    match config.sink {
        AuditSinkKind::Tracing => Ok(Arc::new(TracingAuditSink)),
        AuditSinkKind::File => Ok(Arc::new(FileAuditSink::new(&config.dir)?)),
    }
}
