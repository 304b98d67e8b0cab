//! Configuration management using Figment.
//!
//! Layered sources, later ones winning: built-in defaults, then an optional
//! `config.toml`, then `SNIPBOX_`-prefixed environment variables
//! (`SNIPBOX_SERVER_ADDR`, `SNIPBOX_SESSION_SECURE`, ...).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::session::SessionConfig;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    ///
    /// Default: `"127.0.0.1:4000"`
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Per-request timeout in seconds.
    ///
    /// Default: `30`
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How many snippets the home page shows.
    ///
    /// Default: `10`
    #[serde(default = "default_latest_snippets")]
    pub latest_snippets: usize,

    /// Directory holding the page templates.
    ///
    /// Default: `"ui/html"`
    #[serde(default = "default_template_dir")]
    pub template_dir: String,
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            request_timeout_secs: default_request_timeout_secs(),
            latest_snippets: default_latest_snippets(),
            template_dir: default_template_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `"info"` or `"snipbox=debug,info"`.
    ///
    /// Default: `"info"`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines.
    ///
    /// Default: `false`
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from defaults, `config.toml`, and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration with an explicit TOML path.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SNIPBOX_").split("_"))
            .extract()?;
        Ok(config)
    }
}

// Default value functions
fn default_addr() -> String {
    "127.0.0.1:4000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_latest_snippets() -> usize {
    10
}

fn default_template_dir() -> String {
    "ui/html".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
