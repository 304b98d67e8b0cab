//! Error types and HTTP response conversion
//!
//! Server-side failures are logged with full detail via `tracing` and
//! surfaced to the client as a generic message. Client errors carry a short
//! message and never leak internals.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::StorageError;

/// Result type alias using the application error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the application
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Template parse or render error
    #[error("template error: {0}")]
    Template(Box<minijinja::Error>),

    /// Session error
    #[error("session error: {0}")]
    Session(String),

    /// Storage collaborator error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Malformed submission
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("not found")]
    NotFound,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Error::NotFound | Error::Storage(StorageError::NotFound) => {
                (StatusCode::NOT_FOUND, "Not Found")
            }

            Error::BadRequest(msg) => {
                tracing::debug!("bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "Bad Request")
            }

            Error::Template(e) => {
                tracing::error!("template error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }

            Error::Session(msg) => {
                tracing::error!("session error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }

            Error::Storage(e) => {
                tracing::error!("storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }

            Error::Config(e) => {
                tracing::error!("configuration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }

            Error::Io(e) => {
                tracing::error!("I/O error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }

            Error::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        (status, body).into_response()
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Error::Template(Box::new(err))
    }
}
