//! Route table and middleware chains.
//!
//! Three chains, innermost listed first:
//!
//! * protected routes additionally pass the authentication gate;
//! * dynamic routes get session activation and CSRF enforcement;
//! * every route (including the fallback) gets security headers, request
//!   logging, panic recovery, and the request timeout.
//!
//! With axum the last `.layer()` call is the outermost wrapper.

use axum::{
    handler::Handler,
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::middleware::{apply_secure_headers, RecoverPanicLayer, RequestLogLayer, RequireAuthLayer};
use crate::session::CsrfLayer;
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    // the gate wraps the handlers themselves, not the route, so a method
    // mismatch still answers 405 instead of a login redirect
    let protected = Router::new()
        .route(
            "/snippet/create",
            get(handlers::create_snippet_form.layer(RequireAuthLayer::new()))
                .post(handlers::create_snippet.layer(RequireAuthLayer::new())),
        )
        .route(
            "/user/logout",
            post(handlers::logout.layer(RequireAuthLayer::new())),
        );

    let dynamic = Router::new()
        .route("/", get(handlers::home))
        .route("/snippet/{id}", get(handlers::show_snippet))
        .route(
            "/user/signup",
            get(handlers::signup_form).post(handlers::signup),
        )
        .route(
            "/user/login",
            get(handlers::login_form).post(handlers::login),
        )
        .merge(protected)
        .layer(CsrfLayer::new(state.config.session.csrf.clone()))
        .layer(state.sessions.layer());

    let app = Router::new()
        .route("/ping", get(handlers::ping))
        .merge(dynamic)
        .fallback(handlers::not_found)
        .with_state(state.clone());

    apply_secure_headers(app)
        .layer(TimeoutLayer::new(state.config.server.request_timeout()))
        .layer(RequestLogLayer::new())
        .layer(RecoverPanicLayer::new())
}
