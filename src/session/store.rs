//! Session storage trait and the in-memory implementation.
//!
//! The store keeps whole session records keyed by token. Expired records are
//! treated as absent and dropped on load.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

use crate::error::Result;

use super::SessionValue;

/// A persisted session: the key/value bag plus its absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub bag: HashMap<String, SessionValue>,
    pub expires_at: SystemTime,
}

impl SessionRecord {
    /// A session is valid iff `now < expires_at`.
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

/// Session storage backend.
///
/// Implementations must be safe under concurrent access from request tasks
/// referencing the same or different tokens.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the record for `token`.
    ///
    /// Returns `Ok(None)` if the session does not exist or has expired.
    async fn load_record(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Save (or overwrite) the record for `token`.
    async fn save_record(&self, token: &str, record: SessionRecord) -> Result<()>;

    /// Delete the record for `token`.
    async fn delete_record(&self, token: &str) -> Result<()>;

    /// Drop expired records, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

/// In-memory session store.
///
/// Sessions are lost on restart and not shared across instances.
#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_record(&self, token: &str) -> Result<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        if let Some(record) = sessions.get(token) {
            if record.is_expired() {
                drop(sessions);
                self.sessions.write().await.remove(token);
                return Ok(None);
            }
            return Ok(Some(record.clone()));
        }
        Ok(None)
    }

    async fn save_record(&self, token: &str, record: SessionRecord) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(token.to_string(), record);
        Ok(())
    }

    async fn delete_record(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired());
        Ok(before - sessions.len())
    }
}
