//! Session activation middleware.
//!
//! [`SessionLayer`] resolves the inbound session cookie to a [`Session`]
//! handle, places it in request extensions for handlers and inner middleware,
//! and after the response is produced persists any mutations and appends the
//! matching `Set-Cookie` header.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request},
    response::Response,
};

use super::config::SessionConfig;
use super::{Session, SessionManager};

/// Layer that activates session handling for every request it wraps.
#[derive(Clone)]
pub struct SessionLayer {
    manager: SessionManager,
}

impl SessionLayer {
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }
}

impl<S> tower::Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            manager: self.manager.clone(),
        }
    }
}

/// Session middleware service.
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    manager: SessionManager,
}

impl<S> tower::Service<Request<Body>> for SessionService<S>
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

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let manager = self.manager.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let token = cookie_value(request.headers(), &manager.config().cookie_name);
            let session = manager.load_or_create(token.as_deref()).await;

            request.extensions_mut().insert(session.clone());

            let mut response = inner.call(request).await?;

            manager.finalize(&session, response.headers_mut()).await;
            Ok(response)
        })
    }
}

/// First value for `name` across all `Cookie` headers.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k.trim() == name).then(|| v.trim().to_string())
        })
        .next()
}

/// Append a `Set-Cookie` refreshing the session cookie.
pub(crate) fn append_session_cookie(headers: &mut HeaderMap, config: &SessionConfig, token: &str) {
    let cookie = format!(
        "{}={}; Path={}; Max-Age={}; SameSite=Lax{}{}",
        config.cookie_name,
        token,
        config.cookie_path,
        config.lifetime_secs,
        if config.http_only { "; HttpOnly" } else { "" },
        if config.secure { "; Secure" } else { "" },
    );
    append_cookie_header(headers, &cookie);
}

/// Append a `Set-Cookie` that removes the session cookie.
pub(crate) fn append_clearing_cookie(headers: &mut HeaderMap, config: &SessionConfig) {
    let cookie = format!(
        "{}=; Path={}; Max-Age=0; SameSite=Lax{}{}",
        config.cookie_name,
        config.cookie_path,
        if config.http_only { "; HttpOnly" } else { "" },
        if config.secure { "; Secure" } else { "" },
    );
    append_cookie_header(headers, &cookie);
}

fn append_cookie_header(headers: &mut HeaderMap, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => {
            tracing::warn!("skipping unencodable session cookie: {e}");
        }
    }
}
