//! snipbox: a multi-user snippet-sharing web service.
//!
//! The interesting part is the request pipeline: composable middleware for
//! panic recovery, request logging, security headers, session activation,
//! CSRF enforcement, and authentication gating, wrapped around thin handlers
//! that lean on a startup-built template cache and a declarative form
//! validator.
//!
//! # Example
//!
//! ```rust,ignore
//! use snipbox::{config::Config, routes, server, state::AppState, templates::TemplateCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     snipbox::init_tracing(&Config::load()?.logging)?;
//!     let config = Config::load()?;
//!     let templates = TemplateCache::from_dir("ui/html")?;
//!     let app = routes::router(AppState::new(config.clone(), templates));
//!     server::serve(app, &config.server.addr).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;
pub mod templates;

pub use error::{Error, Result};

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from the logging configuration.
pub fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}
