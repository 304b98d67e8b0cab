//! In-memory reference implementations of the storage contracts.
//!
//! Suitable for development and testing; records are lost on restart.
//! Passwords are hashed with Argon2id so the credential path behaves like a
//! production backend.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};

use super::{Snippet, SnippetStore, StorageError, User, UserStore};

/// In-memory snippet store.
#[derive(Default)]
pub struct MemorySnippetStore {
    snippets: RwLock<Vec<Snippet>>,
    next_id: AtomicI64,
}

impl MemorySnippetStore {
    pub fn new() -> Self {
        Self {
            snippets: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl SnippetStore for MemorySnippetStore {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: u32,
    ) -> Result<i64, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let snippet = Snippet {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created: now,
            expires: now + Duration::days(i64::from(expires_days)),
        };
        self.snippets.write().await.push(snippet);
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Snippet, StorageError> {
        let now = Utc::now();
        self.snippets
            .read()
            .await
            .iter()
            .find(|s| s.id == id && s.expires > now)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn latest(&self, n: usize) -> Result<Vec<Snippet>, StorageError> {
        let now = Utc::now();
        let mut live: Vec<Snippet> = self
            .snippets
            .read()
            .await
            .iter()
            .filter(|s| s.expires > now)
            .cloned()
            .collect();
        live.sort_by(|a, b| b.created.cmp(&a.created));
        live.truncate(n);
        Ok(live)
    }
}

/// In-memory user store with Argon2id password hashing.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), StorageError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(StorageError::DuplicateEmail);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hashed = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| StorageError::Backend(format!("password hashing failed: {e}")))?
            .to_string();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        users.push(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            hashed_password: hashed,
            created: Utc::now(),
        });
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, StorageError> {
        let users = self.users.read().await;
        let user = users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .ok_or(StorageError::InvalidCredentials)?;

        let parsed = PasswordHash::new(&user.hashed_password)
            .map_err(|e| StorageError::Backend(format!("stored hash is invalid: {e}")))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| StorageError::InvalidCredentials)?;

        Ok(user.id)
    }

    async fn get(&self, id: i64) -> Result<User, StorageError> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}
