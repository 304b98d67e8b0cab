use std::time::Duration;

use snipbox::{config::Config, routes, server, state::AppState, templates::TemplateCache};

/// How often expired session records are swept out of the store.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    snipbox::init_tracing(&config.logging)?;

    // template parse errors are fatal at startup, never runtime 500s
    let templates = TemplateCache::from_dir(&config.server.template_dir)?;
    tracing::info!(
        templates = templates.template_names().len(),
        "template cache built"
    );

    let addr = config.server.addr.clone();
    let state = AppState::new(config, templates);

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(purged = n, "expired sessions removed"),
                Err(e) => tracing::warn!("session purge failed: {e}"),
            }
        }
    });

    server::serve(routes::router(state), &addr).await?;
    Ok(())
}
