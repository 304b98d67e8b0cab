//! Startup-built template cache.
//!
//! All page templates are parsed once at startup; a template that fails to
//! parse makes startup fail instead of surfacing as a runtime 500. Pages are
//! rendered by logical name (`"home"` renders `home.html`) against a
//! [`PageContext`] carrying the data every page needs plus the page-specific
//! payload.

use chrono::{Datelike, Utc};
use minijinja::Environment;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::forms::FormView;
use crate::models::Snippet;
use crate::session::{flash, CsrfToken, FlashMessage, Session};

/// Parsed templates, keyed by file name.
pub struct TemplateCache {
    env: Environment<'static>,
}

impl TemplateCache {
    /// Parse every `.html` file directly under `dir`.
    ///
    /// Fails on the first unreadable or unparseable template.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut env = Environment::new();

        let mut entries: Vec<_> = fs::read_dir(dir)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
            .collect();
        entries.sort();

        if entries.is_empty() {
            return Err(Error::Internal(format!(
                "no templates found in {}",
                dir.display()
            )));
        }

        for path in entries {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    Error::Internal(format!("non-UTF-8 template name: {}", path.display()))
                })?
                .to_string();
            let source = fs::read_to_string(&path)?;
            env.add_template_owned(name, source)?;
        }

        Ok(Self { env })
    }

    /// Render the page template named `page` (without the `.html` suffix).
    pub fn render(&self, page: &str, ctx: &PageContext) -> Result<String> {
        let template = self.env.get_template(&format!("{page}.html"))?;
        Ok(template.render(ctx)?)
    }

    /// Names of the cached templates, sorted.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.env.templates().map(|(name, _)| name).collect();
        names.sort_unstable();
        names
    }
}

/// Data handed to every page render.
///
/// The session-derived fields are filled by [`PageContext::new`]; handlers
/// set the page-specific ones they need.
#[derive(Debug, Serialize)]
pub struct PageContext {
    /// Token pages embed in their forms.
    pub csrf_token: String,
    /// Pending flash message, consumed by this render.
    pub flash: Option<FlashMessage>,
    /// Whether the requester is logged in.
    pub authenticated: bool,
    /// Year for the footer copyright line.
    pub current_year: i32,

    pub snippet: Option<Snippet>,
    pub snippets: Vec<Snippet>,
    pub form: Option<FormView>,
}

impl PageContext {
    /// Build the common data from the request's session. Reads (and thereby
    /// consumes) the pending flash message.
    pub fn new(session: &Session, csrf_token_length: usize) -> Self {
        Self {
            csrf_token: CsrfToken::get_or_create(session, csrf_token_length)
                .token()
                .to_string(),
            flash: flash::pop(session),
            authenticated: session.user_id().is_some(),
            current_year: Utc::now().year(),
            snippet: None,
            snippets: Vec::new(),
            form: None,
        }
    }

    /// Context for rendering outside any session (error pages).
    pub fn bare() -> Self {
        Self {
            csrf_token: String::new(),
            flash: None,
            authenticated: false,
            current_year: Utc::now().year(),
            snippet: None,
            snippets: Vec::new(),
            form: None,
        }
    }
}
