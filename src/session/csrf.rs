//! CSRF (Cross-Site Request Forgery) protection.
//!
//! A per-session token is generated on first use and stored in the session
//! bag. Pages embed it in forms as a hidden field; [`CsrfLayer`] validates it
//! on every unsafe-method request before the handler runs.
//!
//! # How it works
//!
//! 1. A CSRF token is generated and stored in the session
//! 2. The token is made available to templates via the [`CsrfToken`] extractor
//! 3. Forms include the token as a hidden field (or clients send a header)
//! 4. The [`CsrfLayer`] middleware validates the token on POST/PUT/DELETE/PATCH

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
};
use rand::Rng;

use super::config::CsrfConfig;
use super::Session;
use crate::error::Error;

const CSRF_SESSION_KEY: &str = "_csrf_token";

/// Largest form body the token check will buffer.
const MAX_FORM_BODY_BYTES: usize = 1024 * 1024;

/// CSRF token extractor and helper.
///
/// Use this extractor to get the CSRF token for inclusion in forms. The token
/// is generated and stored in the session on first access.
#[derive(Debug, Clone)]
pub struct CsrfToken(String);

impl CsrfToken {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(token)
    }

    /// Get the raw token string.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Generate a new random CSRF token.
    #[must_use]
    pub fn generate(length: usize) -> Self {
        let token: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Get the session's token, generating and storing one if absent.
    pub fn get_or_create(session: &Session, length: usize) -> Self {
        if let Some(token) = session.get_string(CSRF_SESSION_KEY) {
            return Self(token);
        }
        let token = Self::generate(length);
        session.put_string(CSRF_SESSION_KEY, token.0.clone());
        token
    }

    /// Replace the session's token with a fresh one.
    ///
    /// Call after login to prevent token fixation.
    pub fn regenerate(session: &Session, length: usize) -> Self {
        let token = Self::generate(length);
        session.put_string(CSRF_SESSION_KEY, token.0.clone());
        token
    }
}

impl std::fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            Error::Session("session not found in request extensions for CSRF".to_string())
        })?;

        const DEFAULT_TOKEN_LENGTH: usize = 32;
        Ok(Self::get_or_create(&session, DEFAULT_TOKEN_LENGTH))
    }
}

/// CSRF protection middleware layer.
///
/// Validates tokens on the configured state-changing methods (POST by
/// default; methods outside the list fall through so unregistered ones still
/// answer 405). The token may arrive in the configured header or as a form
/// field in an `application/x-www-form-urlencoded` body; form bodies are
/// buffered for the check and handed to the handler intact. Failures are
/// rejected with `400 Bad Request` before the handler runs.
#[derive(Debug, Clone)]
pub struct CsrfLayer {
    config: CsrfConfig,
}

impl CsrfLayer {
    #[must_use]
    pub fn new(config: CsrfConfig) -> Self {
        Self { config }
    }
}

impl<S> tower::Layer<S> for CsrfLayer {
    type Service = CsrfMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

/// CSRF middleware service.
#[derive(Debug, Clone)]
pub struct CsrfMiddleware<S> {
    inner: S,
    config: CsrfConfig,
}

impl<S> tower::Service<Request<Body>> for CsrfMiddleware<S>
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
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let protected = config
                .protected_methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(request.method().as_str()));
            if !protected {
                return inner.call(request).await;
            }

            let session = match request.extensions().get::<Session>() {
                Some(session) => session.clone(),
                None => {
                    tracing::warn!("csrf validation failed: no session on request");
                    return Ok(csrf_error_response());
                }
            };

            let expected = match session.get_string(CSRF_SESSION_KEY) {
                Some(token) => token,
                None => {
                    tracing::warn!("csrf validation failed: no token in session");
                    return Ok(csrf_error_response());
                }
            };

            // Header first; fall back to the form field.
            let header_token = request
                .headers()
                .get(&config.header_name)
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            let (provided, request) = match header_token {
                Some(token) => (Some(token), request),
                None => match extract_form_token(request, &config.form_field).await {
                    Ok(pair) => pair,
                    Err(response) => return Ok(response),
                },
            };

            let provided = match provided {
                Some(token) => token,
                None => {
                    tracing::warn!("csrf validation failed: no token provided");
                    return Ok(csrf_error_response());
                }
            };

            if !constant_time_compare(&expected, &provided) {
                tracing::warn!("csrf validation failed: token mismatch");
                return Ok(csrf_error_response());
            }

            inner.call(request).await
        })
    }
}

/// Buffer a form body, pull out the token field, and rebuild the request so
/// the handler still sees the full body.
async fn extract_form_token(
    request: Request<Body>,
    form_field: &str,
) -> Result<(Option<String>, Request<Body>), Response> {
    let is_form = request
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if !is_form {
        return Ok((None, request));
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_FORM_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("csrf validation failed: unreadable form body: {e}");
            return Err(csrf_error_response());
        }
    };

    let token = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
        .ok()
        .and_then(|pairs| {
            pairs
                .into_iter()
                .find(|(name, _)| name == form_field)
                .map(|(_, value)| value)
        });

    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

fn csrf_error_response() -> Response {
    (StatusCode::BAD_REQUEST, "Bad Request").into_response()
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
