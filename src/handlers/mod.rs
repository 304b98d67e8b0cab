//! Request handlers.
//!
//! Handlers stay thin: decode the submission, run the validation checks,
//! call the storage collaborators, and either re-render the page with the
//! recorded errors or set a flash and redirect. All POST-then-redirect
//! responses use `303 See Other` so a refresh never resubmits the form.

use axum::{
    extract::{Path, RawForm, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::error::{Error, Result};
use crate::forms::{Form, EMAIL_RX};
use crate::models::StorageError;
use crate::session::{flash, CsrfToken, FlashMessage, Session};
use crate::state::AppState;
use crate::templates::PageContext;

/// GET /ping
pub async fn ping() -> &'static str {
    "OK"
}

/// GET /
pub async fn home(State(state): State<AppState>, session: Session) -> Result<Response> {
    let snippets = state
        .snippets
        .latest(state.config.server.latest_snippets)
        .await?;

    let mut ctx = page_context(&state, &session);
    ctx.snippets = snippets;
    render(&state, "home", &ctx)
}

/// GET /snippet/{id}
pub async fn show_snippet(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Response> {
    // non-numeric or non-positive ids are indistinguishable from unknown ones
    let id: i64 = id.parse().map_err(|_| Error::NotFound)?;
    if id < 1 {
        return Err(Error::NotFound);
    }

    let snippet = state.snippets.get(id).await?;

    let mut ctx = page_context(&state, &session);
    ctx.snippet = Some(snippet);
    render(&state, "show", &ctx)
}

/// GET /snippet/create
pub async fn create_snippet_form(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response> {
    // pre-select the default expiry
    let form = Form::new(vec![("expires".to_string(), "365".to_string())]);

    let mut ctx = page_context(&state, &session);
    ctx.form = Some(form.view());
    render(&state, "create", &ctx)
}

/// POST /snippet/create
pub async fn create_snippet(
    State(state): State<AppState>,
    session: Session,
    RawForm(body): RawForm,
) -> Result<Response> {
    let mut form = Form::from_urlencoded(&body)?;
    form.required(&["title", "content", "expires"]);
    form.max_length("title", 100);
    form.permitted_values("expires", &["365", "7", "1"]);

    if !form.valid() {
        let mut ctx = page_context(&state, &session);
        ctx.form = Some(form.view());
        return render(&state, "create", &ctx);
    }

    let expires_days: u32 = form
        .get("expires")
        .parse()
        .map_err(|_| Error::BadRequest("invalid expires value".to_string()))?;

    let id = state
        .snippets
        .insert(form.get("title"), form.get("content"), expires_days)
        .await?;

    flash::push(&session, FlashMessage::success("Snippet successfully created!"))?;
    Ok(Redirect::to(&format!("/snippet/{id}")).into_response())
}

/// GET /user/signup
pub async fn signup_form(State(state): State<AppState>, session: Session) -> Result<Response> {
    let mut ctx = page_context(&state, &session);
    ctx.form = Some(Form::default().view());
    render(&state, "signup", &ctx)
}

/// POST /user/signup
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    RawForm(body): RawForm,
) -> Result<Response> {
    let mut form = Form::from_urlencoded(&body)?;
    form.required(&["name", "email", "password"]);
    form.matches_pattern("email", &EMAIL_RX);
    form.min_length("password", 10);

    if !form.valid() {
        let mut ctx = page_context(&state, &session);
        ctx.form = Some(form.view());
        return render(&state, "signup", &ctx);
    }

    match state
        .users
        .insert(form.get("name"), form.get("email"), form.get("password"))
        .await
    {
        Ok(()) => {}
        Err(StorageError::DuplicateEmail) => {
            form.add_error("email", "Email address is already in use");
            let mut ctx = page_context(&state, &session);
            ctx.form = Some(form.view());
            return render(&state, "signup", &ctx);
        }
        Err(e) => return Err(e.into()),
    }

    flash::push(
        &session,
        FlashMessage::success("Your signup was successful. Please log in."),
    )?;
    Ok(Redirect::to("/user/login").into_response())
}

/// GET /user/login
pub async fn login_form(State(state): State<AppState>, session: Session) -> Result<Response> {
    let mut ctx = page_context(&state, &session);
    ctx.form = Some(Form::default().view());
    render(&state, "login", &ctx)
}

/// POST /user/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    RawForm(body): RawForm,
) -> Result<Response> {
    let mut form = Form::from_urlencoded(&body)?;
    form.required(&["email", "password"]);
    form.matches_pattern("email", &EMAIL_RX);

    if !form.valid() {
        let mut ctx = page_context(&state, &session);
        ctx.form = Some(form.view());
        return render(&state, "login", &ctx);
    }

    let user_id = match state
        .users
        .authenticate(form.get("email"), form.get("password"))
        .await
    {
        Ok(id) => id,
        Err(StorageError::InvalidCredentials) => {
            // deliberately vague: never confirm which half was wrong
            form.add_error("generic", "Email or Password is incorrect");
            let mut ctx = page_context(&state, &session);
            ctx.form = Some(form.view());
            return render(&state, "login", &ctx);
        }
        Err(e) => return Err(e.into()),
    };

    // fresh token and fresh CSRF token on privilege change
    session.log_in(user_id, state.config.session.lifetime());
    CsrfToken::regenerate(&session, state.config.session.csrf.token_length);

    Ok(Redirect::to("/snippet/create").into_response())
}

/// POST /user/logout
pub async fn logout(session: Session) -> Result<Response> {
    session.log_out();
    flash::push(
        &session,
        FlashMessage::success("You've been logged out successfully!"),
    )?;
    Ok(Redirect::to("/").into_response())
}

/// Fallback for unmatched paths.
pub async fn not_found() -> Error {
    Error::NotFound
}

fn page_context(state: &AppState, session: &Session) -> PageContext {
    PageContext::new(session, state.config.session.csrf.token_length)
}

fn render(state: &AppState, page: &str, ctx: &PageContext) -> Result<Response> {
    let html = state.templates.render(page, ctx)?;
    Ok((StatusCode::OK, Html(html)).into_response())
}
