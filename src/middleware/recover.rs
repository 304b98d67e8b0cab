//! Panic recovery middleware.
//!
//! Outermost layer of the chain: a panicking handler (or inner middleware)
//! becomes a generic `500 Internal Server Error` with `Connection: close`
//! instead of tearing down the connection task. Both panic sites are covered,
//! the synchronous `call` and the awaited response future.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Layer applying [`RecoverPanicService`].
#[derive(Debug, Clone, Default)]
pub struct RecoverPanicLayer;

impl RecoverPanicLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> tower::Layer<S> for RecoverPanicLayer {
    type Service = RecoverPanicService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoverPanicService { inner }
    }
}

/// Panic recovery middleware service.
#[derive(Debug, Clone)]
pub struct RecoverPanicService<S> {
    inner: S,
}

impl<S> tower::Service<Request<Body>> for RecoverPanicService<S>
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
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // the call itself may panic before returning a future
            let future = match std::panic::catch_unwind(AssertUnwindSafe(|| inner.call(request))) {
                Ok(future) => future,
                Err(panic) => return Ok(panic_response(panic)),
            };

            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Ok(panic_response(panic)),
            }
        })
    }
}

fn panic_response(panic: Box<dyn Any + Send>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    };
    tracing::error!("recovered from handler panic: {detail}");

    let mut response =
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
