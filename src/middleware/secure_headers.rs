//! Security headers middleware.
//!
//! Applies clickjacking and XSS protection headers to every response using
//! `tower_http::set_header::SetResponseHeaderLayer`.

use axum::http::HeaderValue;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

/// Apply the standard security headers to every response from the router.
///
/// A handler-set value wins; these are fallbacks.
pub fn apply_secure_headers(app: Router) -> Router {
    app.layer(SetResponseHeaderLayer::if_not_present(
        http::header::X_FRAME_OPTIONS,
        HeaderValue::from_static("deny"),
    ))
    .layer(SetResponseHeaderLayer::if_not_present(
        http::header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    ))
}
