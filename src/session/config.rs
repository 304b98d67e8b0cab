//! Session and CSRF configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session configuration.
///
/// Controls cookie attributes and session lifetime.
///
/// # Example
///
/// ```toml
/// [session]
/// cookie_name = "session"
/// lifetime_secs = 43200
/// secure = true
/// http_only = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session cookie name.
    ///
    /// Default: `"session"`
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session lifetime in seconds. Doubles as the cookie `Max-Age`.
    ///
    /// Default: `43200` (12 hours)
    #[serde(default = "default_lifetime_secs")]
    pub lifetime_secs: u64,

    /// Cookie path.
    ///
    /// Default: `"/"`
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Secure cookie flag (HTTPS only). Set to `false` for local development
    /// without TLS.
    ///
    /// Default: `true`
    #[serde(default = "default_secure")]
    pub secure: bool,

    /// HttpOnly cookie flag.
    ///
    /// Default: `true`
    #[serde(default = "default_http_only")]
    pub http_only: bool,

    /// Opaque secret for session backends that sign or encrypt their cookies.
    /// The built-in server-side store keeps only a random token in the cookie
    /// and does not use it.
    #[serde(default)]
    pub secret: Option<String>,

    /// CSRF protection configuration.
    #[serde(default)]
    pub csrf: CsrfConfig,
}

impl SessionConfig {
    /// Session lifetime as a [`Duration`].
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            lifetime_secs: default_lifetime_secs(),
            cookie_path: default_cookie_path(),
            secure: default_secure(),
            http_only: default_http_only(),
            secret: None,
            csrf: CsrfConfig::default(),
        }
    }
}

/// CSRF protection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// CSRF token length in characters.
    ///
    /// Default: `32`
    #[serde(default = "default_token_length")]
    pub token_length: usize,

    /// HTTP header checked for the token before the form body.
    ///
    /// Default: `"X-CSRF-Token"`
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Form field checked for the token.
    ///
    /// Default: `"_csrf"`
    #[serde(default = "default_form_field")]
    pub form_field: String,

    /// Methods the token check applies to. Methods outside the list fall
    /// through, so a path that never registered them still answers 405.
    ///
    /// Default: `["POST"]`
    #[serde(default = "default_protected_methods")]
    pub protected_methods: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_length: default_token_length(),
            header_name: default_header_name(),
            form_field: default_form_field(),
            protected_methods: default_protected_methods(),
        }
    }
}

// Default value functions
fn default_cookie_name() -> String {
    "session".to_string()
}

fn default_lifetime_secs() -> u64 {
    43200 // 12 hours
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_secure() -> bool {
    true
}

fn default_http_only() -> bool {
    true
}

fn default_token_length() -> usize {
    32
}

fn default_header_name() -> String {
    "X-CSRF-Token".to_string()
}

fn default_form_field() -> String {
    "_csrf".to_string()
}

fn default_protected_methods() -> Vec<String> {
    vec!["POST".to_string()]
}
