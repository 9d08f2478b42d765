//! Abstract storage interfaces for pluggable backends
//!
//! Users and projects are plain records; each backend only has to offer
//! lookups by id (and by email for users), whole-record saves and deletes.
//! The one compare-and-swap is session rotation, which must be atomic per
//! session record. Nothing spans more than one record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::session::SessionRecord;
use crate::auth::user::User;
use crate::core::project::Project;
use crate::error::Result;

/// User data storage interface
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Get user by ID
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>>;

    /// Get user by email (exact, case-sensitive match)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert or replace a user. Fails with `Conflict` when another user
    /// already holds the email.
    async fn save(&self, user: User) -> Result<()>;

    /// Delete a user, returning whether it existed
    async fn delete_by_id(&self, user_id: &str) -> Result<bool>;
}

/// Project data storage interface
#[async_trait]
pub trait ProjectStorage: Send + Sync {
    /// Get project by ID regardless of owner
    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>>;

    /// Get project by ID only if `owner_id` owns it
    async fn find_owned(&self, project_id: &str, owner_id: &str) -> Result<Option<Project>>;

    /// All projects of one owner, oldest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Project>>;

    /// Insert or replace a project
    async fn save(&self, project: Project) -> Result<()>;

    /// Delete a project, returning whether it existed
    async fn delete_by_id(&self, project_id: &str) -> Result<bool>;
}

/// Refresh session storage. Only ids are kept, never token strings.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Record a session opened by signin. A backend may drop the user's
    /// oldest sessions to stay within a per-user limit.
    async fn start(&self, record: SessionRecord) -> Result<()>;

    /// Replace the session's current refresh id with `next_refresh_id`, but
    /// only if it still equals `presented_refresh_id`. Returns whether the
    /// swap happened; an unknown session never swaps.
    async fn rotate(&self, session_id: &str, presented_refresh_id: &str, next_refresh_id: &str)
        -> Result<bool>;

    /// Drop sessions not rotated since `rotated_before`, returning how many went
    async fn prune_idle(&self, rotated_before: DateTime<Utc>) -> Result<usize>;
}

/// Combined storage provider interface
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get user storage backend
    fn user_storage(&self) -> &dyn UserStorage;

    /// Get project storage backend
    fn project_storage(&self) -> &dyn ProjectStorage;

    /// Get refresh session storage backend
    fn session_storage(&self) -> &dyn SessionStorage;

    /// Health check for the storage backend
    async fn health_check(&self) -> Result<bool>;
}
