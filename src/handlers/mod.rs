//! Request handlers for the HTTP endpoints

pub mod auth;
pub mod projects;
pub mod rejection;
pub mod users;

pub use auth::{authenticate_request, with_auth, with_context};
pub use rejection::handle_rejection;
