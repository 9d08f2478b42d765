//! Ownership rule for project mutation

use crate::auth::user::Identity;
use crate::core::project::Project;
use crate::error::{ApiError, Result};

pub const NOT_AUTHORIZED: &str = "Not authorized.";

/// Allows mutation only when the caller's user id equals the project's owner id.
///
/// Comparison is on the stable id, never the email.
pub fn ensure_owner(identity: &Identity, project: &Project) -> Result<()> {
    if project.owner_id == identity.user_id {
        Ok(())
    } else {
        Err(ApiError::NotAuthorized(NOT_AUTHORIZED.to_string()))
    }
}
