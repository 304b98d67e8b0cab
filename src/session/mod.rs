//! Cookie-backed session management.
//!
//! Sessions live server-side, keyed by a random token carried in a cookie.
//! [`SessionManager`] owns the store and builds the activation middleware;
//! handlers work with the cheap-to-clone [`Session`] handle placed in request
//! extensions by [`SessionLayer`].
//!
//! # Example
//!
//! ```rust,ignore
//! use snipbox::session::{Session, flash, FlashMessage};
//!
//! async fn login(session: Session) -> impl IntoResponse {
//!     // after verifying credentials...
//!     session.log_in(user_id);
//!     flash::push(&session, FlashMessage::success("Logged in!"))?;
//!     Redirect::to("/snippet/create")
//! }
//! ```

pub mod config;
pub mod csrf;
pub mod flash;
mod middleware;
mod store;

pub use config::{CsrfConfig, SessionConfig};
pub use csrf::{CsrfLayer, CsrfMiddleware, CsrfToken};
pub use flash::{FlashKind, FlashMessage};
pub use middleware::{SessionLayer, SessionService};
pub use store::{MemoryStore, SessionRecord, SessionStore};

use axum::{extract::FromRequestParts, http::request::Parts};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::error::Error;

/// Bag key holding the authenticated user id.
pub const USER_ID_KEY: &str = "authenticated_user_id";

/// Length of session tokens in alphanumeric characters (well over 128 bits
/// of entropy).
const TOKEN_LENGTH: usize = 32;

/// A value stored in a session's bag.
///
/// The bag is deliberately restricted to a small closed set of kinds with
/// per-kind accessors, so reads never need unchecked type assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SessionValue {
    Str(String),
    Int(i64),
    Flag(bool),
}

#[derive(Debug)]
struct SessionState {
    token: String,
    /// Token presented by the client, when it resolved to a live record.
    original_token: Option<String>,
    bag: HashMap<String, SessionValue>,
    expires_at: SystemTime,
    modified: bool,
    destroyed: bool,
}

/// Handle to the current request's session.
///
/// Cloning is cheap; all clones observe the same state. Mutating calls mark
/// the session dirty so the activation middleware persists it and refreshes
/// the cookie when the response is finalized. [`Session::pop_string`] is
/// atomic: the read and the removal happen under one lock.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    fn fresh(lifetime: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                token: generate_token(),
                original_token: None,
                bag: HashMap::new(),
                expires_at: SystemTime::now() + lifetime,
                modified: false,
                destroyed: false,
            })),
        }
    }

    fn resumed(token: &str, record: SessionRecord) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                token: token.to_string(),
                original_token: Some(token.to_string()),
                bag: record.bag,
                expires_at: record.expires_at,
                modified: false,
                destroyed: false,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        // a poisoned lock means a panic mid-mutation; the panic recovery
        // middleware already converted that request to a 500, so continuing
        // with the inner state is safe
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Store a string value.
    pub fn put_string(&self, key: &str, value: impl Into<String>) {
        let mut state = self.lock();
        state.bag.insert(key.to_string(), SessionValue::Str(value.into()));
        state.modified = true;
    }

    /// Store an integer value.
    pub fn put_int(&self, key: &str, value: i64) {
        let mut state = self.lock();
        state.bag.insert(key.to_string(), SessionValue::Int(value));
        state.modified = true;
    }

    /// Store a boolean flag.
    pub fn put_flag(&self, key: &str, value: bool) {
        let mut state = self.lock();
        state.bag.insert(key.to_string(), SessionValue::Flag(value));
        state.modified = true;
    }

    /// Read a string value, if present with that kind.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.lock().bag.get(key) {
            Some(SessionValue::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Read an integer value, if present with that kind.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.lock().bag.get(key) {
            Some(SessionValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Read a flag value, if present with that kind.
    pub fn get_flag(&self, key: &str) -> Option<bool> {
        match self.lock().bag.get(key) {
            Some(SessionValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    /// Read-once: return the string stored under `key` and remove it, in one
    /// atomic step. Subsequent calls return `None` until the key is written
    /// again.
    pub fn pop_string(&self, key: &str) -> Option<String> {
        let mut state = self.lock();
        match state.bag.get(key) {
            Some(SessionValue::Str(_)) => {}
            _ => return None,
        }
        let value = match state.bag.remove(key) {
            Some(SessionValue::Str(s)) => s,
            _ => return None,
        };
        state.modified = true;
        Some(value)
    }

    /// Remove a key of any kind.
    pub fn remove(&self, key: &str) {
        let mut state = self.lock();
        if state.bag.remove(key).is_some() {
            state.modified = true;
        }
    }

    /// Whether the bag holds `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.lock().bag.contains_key(key)
    }

    /// Rotate the session token and extend the expiry, keeping the bag.
    ///
    /// Call on privilege changes (login) to prevent session fixation.
    pub fn renew(&self, lifetime: Duration) {
        let mut state = self.lock();
        state.token = generate_token();
        state.expires_at = SystemTime::now() + lifetime;
        state.modified = true;
    }

    /// Destroy the session: the record is deleted and a clearing cookie is
    /// sent when the response is finalized. Destruction wins over any writes
    /// made later in the same request.
    pub fn destroy(&self) {
        let mut state = self.lock();
        state.bag.clear();
        state.destroyed = true;
        state.modified = true;
    }

    /// The authenticated user id, if logged in.
    pub fn user_id(&self) -> Option<i64> {
        self.get_int(USER_ID_KEY)
    }

    /// Record a successful login: rotate the token and store the user id.
    pub fn log_in(&self, user_id: i64, lifetime: Duration) {
        self.renew(lifetime);
        self.put_int(USER_ID_KEY, user_id);
    }

    /// Remove the authentication mark, keeping the rest of the bag.
    pub fn log_out(&self) {
        self.remove(USER_ID_KEY);
    }

    /// Current session token.
    pub fn token(&self) -> String {
        self.lock().token.clone()
    }

    fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            token: state.token.clone(),
            original_token: state.original_token.clone(),
            bag: state.bag.clone(),
            expires_at: state.expires_at,
            modified: state.modified,
            destroyed: state.destroyed,
        }
    }
}

struct SessionSnapshot {
    token: String,
    original_token: Option<String>,
    bag: HashMap<String, SessionValue>,
    expires_at: SystemTime,
    modified: bool,
    destroyed: bool,
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            Error::Session("session not found in request extensions; is SessionLayer applied?".to_string())
        })
    }
}

/// Owns the session store and configuration; builds the activation
/// middleware and finalizes cookies after the inner service runs.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Manager backed by the in-memory store.
    #[must_use]
    pub fn in_memory(config: SessionConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The activation middleware layer for this manager.
    #[must_use]
    pub fn layer(&self) -> SessionLayer {
        SessionLayer::new(self.clone())
    }

    /// Resolve the inbound cookie token to a session handle.
    ///
    /// Never fails: an absent, unknown, expired, or otherwise unusable token
    /// degrades to a fresh anonymous session.
    pub(crate) async fn load_or_create(&self, token: Option<&str>) -> Session {
        if let Some(token) = token {
            match self.store.load_record(token).await {
                Ok(Some(record)) => return Session::resumed(token, record),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("session load failed, starting fresh: {e}");
                }
            }
        }
        Session::fresh(self.config.lifetime())
    }

    /// Drop expired records from the store.
    pub async fn purge_expired(&self) -> crate::error::Result<usize> {
        self.store.purge_expired().await
    }

    /// Persist the session and emit cookie headers, if the handle was
    /// mutated during the request.
    pub(crate) async fn finalize(&self, session: &Session, headers: &mut http::HeaderMap) {
        let snapshot = session.snapshot();

        if snapshot.destroyed {
            if let Some(original) = &snapshot.original_token {
                if let Err(e) = self.store.delete_record(original).await {
                    tracing::warn!("failed to delete destroyed session: {e}");
                }
            }
            middleware::append_clearing_cookie(headers, &self.config);
            return;
        }

        if !snapshot.modified {
            return;
        }

        // token rotation leaves the old record behind; remove it
        if let Some(original) = &snapshot.original_token {
            if *original != snapshot.token {
                if let Err(e) = self.store.delete_record(original).await {
                    tracing::warn!("failed to delete rotated session: {e}");
                }
            }
        }

        let record = SessionRecord {
            bag: snapshot.bag,
            expires_at: snapshot.expires_at,
        };
        if let Err(e) = self.store.save_record(&snapshot.token, record).await {
            tracing::warn!("failed to save session: {e}");
            return;
        }
        middleware::append_session_cookie(headers, &self.config, &snapshot.token);
    }
}

/// Generate a new random session token.
fn generate_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_generation_is_random() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn pop_string_is_read_once() {
        let session = Session::fresh(Duration::from_secs(60));
        session.put_string("flash", "Saved!");

        assert_eq!(session.pop_string("flash").as_deref(), Some("Saved!"));
        assert_eq!(session.pop_string("flash"), None);
        assert_eq!(session.pop_string("flash"), None);

        // a new write makes it readable exactly once again
        session.put_string("flash", "Again");
        assert_eq!(session.pop_string("flash").as_deref(), Some("Again"));
        assert_eq!(session.pop_string("flash"), None);
    }

    #[test]
    fn typed_accessors_do_not_cross_kinds() {
        let session = Session::fresh(Duration::from_secs(60));
        session.put_int("n", 7);
        assert_eq!(session.get_string("n"), None);
        assert_eq!(session.get_int("n"), Some(7));
        assert_eq!(session.pop_string("n"), None);
        // pop on a mismatched kind leaves the value in place
        assert_eq!(session.get_int("n"), Some(7));
    }

    #[test]
    fn writes_mark_the_session_modified() {
        let session = Session::fresh(Duration::from_secs(60));
        assert!(!session.snapshot().modified);
        session.put_flag("seen", true);
        assert!(session.snapshot().modified);
    }

    #[test]
    fn renew_rotates_the_token() {
        let session = Session::fresh(Duration::from_secs(60));
        let before = session.token();
        session.renew(Duration::from_secs(60));
        assert_ne!(session.token(), before);
        assert!(session.snapshot().modified);
    }

    #[test]
    fn destroy_clears_the_bag_and_wins() {
        let session = Session::fresh(Duration::from_secs(60));
        session.put_int(USER_ID_KEY, 1);
        session.destroy();
        assert!(!session.exists(USER_ID_KEY));
        assert!(session.snapshot().destroyed);
    }

    #[test]
    fn login_logout_cycle() {
        let session = Session::fresh(Duration::from_secs(60));
        assert_eq!(session.user_id(), None);
        session.log_in(42, Duration::from_secs(60));
        assert_eq!(session.user_id(), Some(42));
        session.log_out();
        assert_eq!(session.user_id(), None);
    }

    #[tokio::test]
    async fn manager_degrades_bad_tokens_to_fresh_sessions() {
        let manager = SessionManager::in_memory(SessionConfig::default());

        let session = manager.load_or_create(Some("no-such-token")).await;
        assert_eq!(session.user_id(), None);
        assert!(session.snapshot().original_token.is_none());
    }

    #[tokio::test]
    async fn manager_resumes_saved_sessions() {
        let manager = SessionManager::in_memory(SessionConfig::default());

        let first = manager.load_or_create(None).await;
        first.put_int(USER_ID_KEY, 9);
        let mut headers = http::HeaderMap::new();
        manager.finalize(&first, &mut headers).await;
        assert!(headers.contains_key(http::header::SET_COOKIE));

        let token = first.token();
        let second = manager.load_or_create(Some(&token)).await;
        assert_eq!(second.user_id(), Some(9));
    }

    #[tokio::test]
    async fn unmodified_sessions_set_no_cookie() {
        let manager = SessionManager::in_memory(SessionConfig::default());
        let session = manager.load_or_create(None).await;
        session.get_string("anything");

        let mut headers = http::HeaderMap::new();
        manager.finalize(&session, &mut headers).await;
        assert!(!headers.contains_key(http::header::SET_COOKIE));
    }

    #[tokio::test]
    async fn destroyed_sessions_emit_clearing_cookie() {
        let manager = SessionManager::in_memory(SessionConfig::default());

        let session = manager.load_or_create(None).await;
        session.put_string("k", "v");
        let mut headers = http::HeaderMap::new();
        manager.finalize(&session, &mut headers).await;
        let token = session.token();

        let resumed = manager.load_or_create(Some(&token)).await;
        resumed.destroy();
        let mut headers = http::HeaderMap::new();
        manager.finalize(&resumed, &mut headers).await;

        let cookie = headers
            .get(http::header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.contains("Max-Age=0"));

        // the record is gone
        assert!(manager
            .load_or_create(Some(&token))
            .await
            .snapshot()
            .original_token
            .is_none());
    }
}
