//! Shared application state.

use std::sync::Arc;

use crate::config::Config;
use crate::models::{MemorySnippetStore, MemoryUserStore, SnippetStore, UserStore};
use crate::session::SessionManager;
use crate::templates::TemplateCache;

/// Everything handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionManager,
    pub templates: Arc<TemplateCache>,
    pub snippets: Arc<dyn SnippetStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(config: Config, templates: TemplateCache) -> Self {
        let sessions = SessionManager::in_memory(config.session.clone());
        Self {
            config: Arc::new(config),
            sessions,
            templates: Arc::new(templates),
            snippets: Arc::new(MemorySnippetStore::new()),
            users: Arc::new(MemoryUserStore::new()),
        }
    }

    /// Swap in alternative storage backends.
    #[must_use]
    pub fn with_stores(
        mut self,
        snippets: Arc<dyn SnippetStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        self.snippets = snippets;
        self.users = users;
        self
    }
}
