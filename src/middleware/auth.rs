//! Authentication gate middleware.
//!
//! Wraps routes that require a logged-in user. Anonymous requests are
//! redirected to the login page with `302 Found`; authenticated responses
//! carry `Cache-Control: no-store` so shared caches never serve a
//! logged-in page to someone else.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::Response,
};

use crate::session::Session;

/// Where anonymous requests to gated routes are sent.
pub const LOGIN_PATH: &str = "/user/login";

/// Layer applying [`RequireAuthService`].
#[derive(Debug, Clone, Default)]
pub struct RequireAuthLayer;

impl RequireAuthLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> tower::Layer<S> for RequireAuthLayer {
    type Service = RequireAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAuthService { inner }
    }
}

/// Authentication gate middleware service.
#[derive(Debug, Clone)]
pub struct RequireAuthService<S> {
    inner: S,
}

impl<S> tower::Service<Request<Body>> for RequireAuthService<S>
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
            let authenticated = request
                .extensions()
                .get::<Session>()
                .and_then(Session::user_id)
                .is_some();

            if !authenticated {
                return Ok(login_redirect());
            }

            let mut response = inner.call(request).await?;
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            Ok(response)
        })
    }
}

fn login_redirect() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static(LOGIN_PATH));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionConfig, SessionManager};
    use axum::response::IntoResponse;
    use tower::{service_fn, Layer, ServiceExt};

    async fn session() -> Session {
        SessionManager::in_memory(SessionConfig::default())
            .load_or_create(None)
            .await
    }

    macro_rules! gated {
        () => {
            RequireAuthLayer::new().layer(service_fn(|_req: Request<Body>| async {
                Ok::<Response, std::convert::Infallible>("secret".into_response())
            }))
        };
    }

    #[tokio::test]
    async fn anonymous_requests_are_redirected_to_login() {
        let s = session().await;
        let mut request = Request::builder().body(Body::empty()).unwrap();
        request.extensions_mut().insert(s);

        let response = gated!().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION),
            Some(&HeaderValue::from_static(LOGIN_PATH))
        );
    }

    #[tokio::test]
    async fn missing_session_is_treated_as_anonymous() {
        let request = Request::builder().body(Body::empty()).unwrap();
        let response = gated!().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn authenticated_requests_pass_and_are_uncacheable() {
        let s = session().await;
        s.put_int(crate::session::USER_ID_KEY, 7);

        let mut request = Request::builder().body(Body::empty()).unwrap();
        request.extensions_mut().insert(s);

        let response = gated!().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
    }
}
