//! End-to-end tests for the request pipeline: session cookies, CSRF
//! enforcement, flash messages, the authentication gate, and error mapping.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use snipbox::{config::Config, routes, state::AppState, templates::TemplateCache};

fn app() -> Router {
    let mut config = Config::default();
    config.session.secure = false;
    let templates = TemplateCache::from_dir("ui/html").expect("templates parse");
    routes::router(AppState::new(config, templates))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, http::HeaderMap, String) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.expect("body");
    (
        parts.status,
        parts.headers,
        String::from_utf8_lossy(&bytes).into_owned(),
    )
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// First `session=...` pair from the response's `Set-Cookie` headers.
fn session_cookie(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// CSRF token embedded in a rendered form.
fn csrf_token(html: &str) -> String {
    let marker = r#"name="_csrf" value=""#;
    let start = html.find(marker).expect("hidden csrf field") + marker.len();
    html[start..]
        .chars()
        .take_while(|c| *c != '"')
        .collect()
}

/// Walk the signup + login flow, returning a logged-in session cookie and a
/// matching CSRF token.
async fn log_in(app: &Router, email: &str) -> (String, String) {
    // signup page establishes the session and the token
    let (status, headers, body) = send(app, get("/user/signup", None)).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = session_cookie(&headers).expect("session cookie");
    let token = csrf_token(&body);

    let (status, headers, _) = send(
        app,
        post_form(
            "/user/signup",
            Some(&cookie),
            &format!("name=Alice&email={email}&password=long-enough-pw&_csrf={token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/user/login");
    let cookie = session_cookie(&headers).unwrap_or(cookie);

    let (status, _, body) = send(app, get("/user/login", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    let token = csrf_token(&body);

    let (status, headers, _) = send(
        app,
        post_form(
            "/user/login",
            Some(&cookie),
            &format!("email={email}&password=long-enough-pw&_csrf={token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/snippet/create");

    // login rotates the session token; pick up the new cookie
    let cookie = session_cookie(&headers).expect("rotated cookie");

    let (status, _, body) = send(app, get("/snippet/create", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    (cookie, csrf_token(&body))
}

#[tokio::test]
async fn ping_is_public_and_plain() {
    let app = app();
    let (status, headers, body) = send(&app, get("/ping", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    // no session activation on the public chain
    assert!(session_cookie(&headers).is_none());
}

#[tokio::test]
async fn security_headers_are_on_every_response() {
    let app = app();
    for uri in ["/", "/ping", "/definitely-not-here"] {
        let (_, headers, _) = send(&app, get(uri, None)).await;
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "deny");
        assert_eq!(
            headers.get(header::X_XSS_PROTECTION).unwrap(),
            "1; mode=block"
        );
    }
}

#[tokio::test]
async fn unknown_paths_are_404() {
    let app = app();
    let (status, _, body) = send(&app, get("/definitely-not-here", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");
}

#[tokio::test]
async fn wrong_method_is_405_with_allow() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/ping")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let allow = headers.get(header::ALLOW).expect("Allow header");
    assert!(allow.to_str().unwrap().contains("GET"));
}

#[tokio::test]
async fn wrong_method_on_a_gated_route_is_405_not_a_redirect() {
    let app = app();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/snippet/create")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let allow = headers.get(header::ALLOW).unwrap().to_str().unwrap();
    assert!(allow.contains("GET"));
    assert!(allow.contains("POST"));
}

#[tokio::test]
async fn non_numeric_and_unknown_snippet_ids_are_404() {
    let app = app();
    for uri in ["/snippet/abc", "/snippet/-1", "/snippet/999"] {
        let (status, _, _) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn anonymous_users_are_redirected_from_gated_routes() {
    let app = app();
    let (status, headers, _) = send(&app, get("/snippet/create", None)).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/user/login");
}

#[tokio::test]
async fn post_without_csrf_token_is_rejected() {
    let app = app();

    // establish a session first so only the token is missing
    let (_, headers, _) = send(&app, get("/user/login", None)).await;
    let cookie = session_cookie(&headers).expect("session cookie");

    let (status, _, _) = send(
        &app,
        post_form(
            "/user/login",
            Some(&cookie),
            "email=a@example.com&password=whatever",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_with_wrong_csrf_token_is_rejected() {
    let app = app();
    let (_, headers, _) = send(&app, get("/user/login", None)).await;
    let cookie = session_cookie(&headers).expect("session cookie");

    let (status, _, _) = send(
        &app,
        post_form(
            "/user/login",
            Some(&cookie),
            "email=a@example.com&password=whatever&_csrf=definitely-wrong-token-00000000",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn csrf_token_in_header_is_accepted() {
    let app = app();
    let (_, headers, body) = send(&app, get("/user/login", None)).await;
    let cookie = session_cookie(&headers).expect("session cookie");
    let token = csrf_token(&body);

    let mut request = post_form("/user/login", Some(&cookie), "email=&password=");
    request
        .headers_mut()
        .insert("X-CSRF-Token", token.parse().unwrap());

    // passes CSRF and reaches validation, which re-renders the page
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("This field cannot be blank"));
}

#[tokio::test]
async fn signup_validation_failures_rerender_the_form() {
    let app = app();
    let (_, headers, body) = send(&app, get("/user/signup", None)).await;
    let cookie = session_cookie(&headers).expect("session cookie");
    let token = csrf_token(&body);

    let (status, _, body) = send(
        &app,
        post_form(
            "/user/signup",
            Some(&cookie),
            &format!("name=Bob&email=not-an-email&password=short&_csrf={token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("This field is invalid"));
    assert!(body.contains("This field is too short (minimum is 10 characters)"));
    // submitted values survive the round trip
    assert!(body.contains(r#"value="Bob""#));
}

#[tokio::test]
async fn bad_credentials_get_a_generic_error() {
    let app = app();
    let (cookie, _) = log_in(&app, "carol@example.com").await;

    // fresh anonymous session attempts a login with a wrong password
    let (_, headers, body) = send(&app, get("/user/login", None)).await;
    let anon_cookie = session_cookie(&headers).expect("session cookie");
    let token = csrf_token(&body);

    let (status, _, body) = send(
        &app,
        post_form(
            "/user/login",
            Some(&anon_cookie),
            &format!("email=carol@example.com&password=wrong-password&_csrf={token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Email or Password is incorrect"));

    // the original login is unaffected
    let (status, _, _) = send(&app, get("/snippet/create", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_rotates_the_session_cookie() {
    let app = app();

    let (_, headers, body) = send(&app, get("/user/signup", None)).await;
    let cookie = session_cookie(&headers).expect("session cookie");
    let token = csrf_token(&body);

    let (_, headers, _) = send(
        &app,
        post_form(
            "/user/signup",
            Some(&cookie),
            &format!("name=Dave&email=dave@example.com&password=long-enough-pw&_csrf={token}"),
        ),
    )
    .await;
    let cookie = session_cookie(&headers).unwrap_or(cookie);

    let (_, _, body) = send(&app, get("/user/login", Some(&cookie))).await;
    let token = csrf_token(&body);

    let (status, headers, _) = send(
        &app,
        post_form(
            "/user/login",
            Some(&cookie),
            &format!("email=dave@example.com&password=long-enough-pw&_csrf={token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let rotated = session_cookie(&headers).expect("rotated cookie");
    assert_ne!(rotated, cookie);
}

#[tokio::test]
async fn create_flow_sets_a_one_shot_flash() {
    let app = app();
    let (cookie, token) = log_in(&app, "erin@example.com").await;

    let (status, headers, _) = send(
        &app,
        post_form(
            "/snippet/create",
            Some(&cookie),
            &format!("title=First+snippet&content=Hello+world&expires=7&_csrf={token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = headers.get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/snippet/"));

    // first view shows the flash
    let (status, _, body) = send(&app, get(location, Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Snippet successfully created!"));
    assert!(body.contains("Hello world"));

    // second view does not
    let (_, _, body) = send(&app, get(location, Some(&cookie))).await;
    assert!(!body.contains("Snippet successfully created!"));
}

#[tokio::test]
async fn snippet_create_validation_failures_rerender() {
    let app = app();
    let (cookie, token) = log_in(&app, "frank@example.com").await;

    let long_title = "x".repeat(101);
    let (status, _, body) = send(
        &app,
        post_form(
            "/snippet/create",
            Some(&cookie),
            &format!("title={long_title}&content=&expires=14&_csrf={token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("This field is too long (maximum is 100 characters)"));
    assert!(body.contains("This field cannot be blank"));
    assert!(body.contains("This field is invalid"));
}

#[tokio::test]
async fn gated_pages_are_marked_uncacheable() {
    let app = app();
    let (cookie, _) = log_in(&app, "grace@example.com").await;

    let (status, headers, _) = send(&app, get("/snippet/create", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
}

#[tokio::test]
async fn logout_clears_authentication_and_flashes() {
    let app = app();
    let (cookie, token) = log_in(&app, "heidi@example.com").await;

    let (status, headers, _) = send(
        &app,
        post_form("/user/logout", Some(&cookie), &format!("_csrf={token}")),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/");

    let (status, _, body) = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("been logged out successfully!"));

    // the gate is closed again
    let (status, _, _) = send(&app, get("/snippet/create", Some(&cookie))).await;
    assert_eq!(status, StatusCode::FOUND);
}

#[tokio::test]
async fn duplicate_signup_reports_the_email_field() {
    let app = app();
    let (_, _) = log_in(&app, "ivan@example.com").await;

    let (_, headers, body) = send(&app, get("/user/signup", None)).await;
    let cookie = session_cookie(&headers).expect("session cookie");
    let token = csrf_token(&body);

    let (status, _, body) = send(
        &app,
        post_form(
            "/user/signup",
            Some(&cookie),
            &format!("name=Ivan2&email=ivan@example.com&password=long-enough-pw&_csrf={token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Email address is already in use"));
}

#[tokio::test]
async fn home_lists_latest_snippets_newest_first() {
    let app = app();
    let (cookie, token) = log_in(&app, "judy@example.com").await;

    for title in ["first-title", "second-title"] {
        let (status, _, _) = send(
            &app,
            post_form(
                "/snippet/create",
                Some(&cookie),
                &format!("title={title}&content=body&expires=1&_csrf={token}"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
    }

    let (status, _, body) = send(&app, get("/", None)).await;
    assert_eq!(status, StatusCode::OK);
    let first = body.find("first-title").expect("first snippet listed");
    let second = body.find("second-title").expect("second snippet listed");
    assert!(second < first, "newest snippet is listed first");
}
