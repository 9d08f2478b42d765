//! Authentication and authorization module

pub mod ownership;
pub mod password;
pub mod session;
pub mod token;
pub mod user;

// Re-export main components
pub use ownership::ensure_owner;
pub use password::{PasswordHasher, PasswordPolicy};
pub use session::{RefreshRequest, Session, SessionService, SigninRequest, SignupRequest};
pub use token::{AccessClaims, RefreshClaims, TokenManager, TokenPair};
pub use user::{Identity, User, UserSummary};
