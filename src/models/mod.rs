//! Domain records and the narrow storage interfaces the pipeline consumes.
//!
//! The request pipeline never talks to a database directly; handlers go
//! through [`SnippetStore`] and [`UserStore`]. The in-memory implementations
//! in [`memory`] serve development and tests; real backends live behind the
//! same traits.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use memory::{MemorySnippetStore, MemoryUserStore};

/// A shared text snippet.
#[derive(Debug, Clone, Serialize)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub created: DateTime<Utc>,
}

/// Errors surfaced by the storage collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No matching record found
    #[error("no matching record found")]
    NotFound,

    /// Signup attempted with an email that is already registered
    #[error("email address is already in use")]
    DuplicateEmail,

    /// Login attempted with an unknown email or wrong password
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Backend failure (connection, query, hashing)
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Snippet persistence contract.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Insert a snippet that expires `expires_days` from now, returning its id.
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: u32,
    ) -> Result<i64, StorageError>;

    /// Fetch a single live (non-expired) snippet.
    async fn get(&self, id: i64) -> Result<Snippet, StorageError>;

    /// The `n` most recently created live snippets, newest first.
    async fn latest(&self, n: usize) -> Result<Vec<Snippet>, StorageError>;
}

/// User persistence and credential verification contract.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Register a new user. Fails with [`StorageError::DuplicateEmail`] if
    /// the email is taken.
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), StorageError>;

    /// Verify credentials, returning the user id on success.
    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, StorageError>;

    /// Fetch a user by id.
    async fn get(&self, id: i64) -> Result<User, StorageError>;
}
