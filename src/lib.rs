//! Projects API - user accounts and owner-scoped projects over a JSON REST API
//!
//! Users sign up with a password (stored as an Argon2id hash), sign in for
//! a pair of RS256 tokens, and trade that pair for a fresh one on refresh.
//! Access and refresh tokens are signed by separate keypairs. Projects can
//! only be read and changed by the user who owns them.

pub mod auth;
pub mod config;
pub mod constants;
pub mod context;
pub mod core;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod security;
pub mod security_logger;
pub mod storage;

// Re-export main components
pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{ApiError, Result};
pub use routes::api;
