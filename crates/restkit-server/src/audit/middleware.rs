//! Request logging middleware
//!
//! Writes a `request` category record for every incoming request before it
//! reaches the router. Replies are recorded separately by the dispatcher
//! once the handler has produced one.

use axum::{
    extract::{ConnectInfo, Request},
    response::Response,
};
use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use super::models::{AuditCategory, AuditRecord};
use super::sink::AuditSink;

/// Layer recording incoming requests into an [`AuditSink`]
#[derive(Clone)]
pub struct RequestLogLayer {
    sink: Arc<dyn AuditSink>,
}

impl RequestLogLayer {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogMiddleware {
            inner,
            sink: self.sink.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequestLogMiddleware<S> {
    inner: S,
    sink: Arc<dyn AuditSink>,
}

impl<S> Service<Request> for RequestLogMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let ip_address = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        let user_agent = request
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let record = AuditRecord::new(
            AuditCategory::Request,
            request.method().as_str(),
            request.uri().path(),
        )
        .with_client(ip_address, user_agent);
        self.sink.record(&record);

        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(request).await })
    }
}
