//! HTTP middleware: panic recovery, request logging, security headers, and
//! the authentication gate.
//!
//! Session activation and CSRF enforcement live in [`crate::session`]; the
//! layers here cover the rest of the standard chain.

mod auth;
mod logging;
mod recover;
mod secure_headers;

pub use auth::{RequireAuthLayer, RequireAuthService, LOGIN_PATH};
pub use logging::{RequestLogLayer, RequestLogService};
pub use recover::{RecoverPanicLayer, RecoverPanicService};
pub use secure_headers::apply_secure_headers;
