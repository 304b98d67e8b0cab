//! Request logging middleware.
//!
//! Emits one structured line per request on arrival (remote address, HTTP
//! version, method, path) and one on completion (status, latency).

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::Response,
};
use std::net::SocketAddr;

/// Layer applying [`RequestLogService`].
#[derive(Debug, Clone, Default)]
pub struct RequestLogLayer;

impl RequestLogLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> tower::Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService { inner }
    }
}

/// Request logging middleware service.
#[derive(Debug, Clone)]
pub struct RequestLogService<S> {
    inner: S,
}

impl<S> tower::Service<Request<Body>> for RequestLogService<S>
where
    S: tower::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "-".to_string());
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        tracing::info!(
            remote = %remote,
            version = ?request.version(),
            method = %method,
            path = %path,
            "request received"
        );

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let started = std::time::Instant::now();
            let response = inner.call(request).await?;

            tracing::info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                latency_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
            Ok(response)
        })
    }
}
