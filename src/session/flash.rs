//! One-shot flash messages.
//!
//! A flash is written during one request (usually just before a redirect) and
//! read exactly once by a later request. The message rides in the session bag
//! under a reserved key, JSON-encoded, and the read-once behavior comes from
//! [`Session::pop_string`].

use serde::{Deserialize, Serialize};

use super::Session;
use crate::error::{Error, Result};

/// Reserved bag key for the pending flash message.
pub const FLASH_KEY: &str = "flash";

/// Presentation category of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Info,
    Error,
}

/// A flash message: a category plus display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

impl FlashMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Queue a flash for the next rendered page. A second push before the first
/// is read replaces it.
pub fn push(session: &Session, message: FlashMessage) -> Result<()> {
    let encoded = serde_json::to_string(&message)
        .map_err(|e| Error::Session(format!("failed to encode flash message: {e}")))?;
    session.put_string(FLASH_KEY, encoded);
    Ok(())
}

/// Take the pending flash, if any. Reading consumes it.
///
/// A bag value that does not decode as a flash message is dropped and logged
/// rather than surfaced to the user.
pub fn pop(session: &Session) -> Option<FlashMessage> {
    let encoded = session.pop_string(FLASH_KEY)?;
    match serde_json::from_str(&encoded) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!("discarding undecodable flash message: {e}");
            None
        }
    }
}
