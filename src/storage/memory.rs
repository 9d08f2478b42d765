//! In-memory storage implementation for development and testing
//!
//! Keeps all records in memory behind async read-write locks. Suitable for
//! development, testing, or a single-process deployment without
//! durability requirements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::*;
use crate::auth::session::SessionRecord;
use crate::auth::user::User;
use crate::constants::MAX_SESSIONS_PER_USER;
use crate::core::project::Project;
use crate::error::{ApiError, Result};

pub const EMAIL_TAKEN: &str = "Email already taken.";

#[derive(Default)]
struct UserTables {
    by_id: HashMap<String, User>,
    id_by_email: HashMap<String, String>, // email -> user_id
}

/// In-memory user storage
#[derive(Default)]
pub struct MemoryUserStorage {
    tables: RwLock<UserTables>,
}

impl MemoryUserStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.by_id.get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .id_by_email
            .get(email)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    async fn save(&self, user: User) -> Result<()> {
        // One write guard covers the uniqueness check and both indexes
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        if let Some(holder) = tables.id_by_email.get(&user.email) {
            if holder != &user.id {
                return Err(ApiError::Conflict(EMAIL_TAKEN.to_string()));
            }
        }

        if let Some(previous) = tables.by_id.get(&user.id) {
            if previous.email != user.email {
                tables.id_by_email.remove(&previous.email);
            }
        }

        tables.id_by_email.insert(user.email.clone(), user.id.clone());
        tables.by_id.insert(user.id.clone(), user);
        Ok(())
    }

    async fn delete_by_id(&self, user_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.by_id.remove(user_id) {
            Some(user) => {
                tables.id_by_email.remove(&user.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory project storage
#[derive(Default)]
pub struct MemoryProjectStorage {
    projects: RwLock<HashMap<String, Project>>,
}

impl MemoryProjectStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStorage for MemoryProjectStorage {
    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(project_id).cloned())
    }

    async fn find_owned(&self, project_id: &str, owner_id: &str) -> Result<Option<Project>> {
        Ok(self
            .projects
            .read()
            .await
            .get(project_id)
            .filter(|project| project.owner_id == owner_id)
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Project>> {
        let projects = self.projects.read().await;
        let mut owned: Vec<Project> = projects
            .values()
            .filter(|project| project.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn save(&self, project: Project) -> Result<()> {
        self.projects.write().await.insert(project.id.clone(), project);
        Ok(())
    }

    async fn delete_by_id(&self, project_id: &str) -> Result<bool> {
        Ok(self.projects.write().await.remove(project_id).is_some())
    }
}

#[derive(Default)]
struct SessionTables {
    by_id: HashMap<String, SessionRecord>,
    ids_by_user: HashMap<String, VecDeque<String>>, // user_id -> session ids, oldest first
}

impl SessionTables {
    fn remove(&mut self, session_id: &str) {
        if let Some(record) = self.by_id.remove(session_id) {
            if let Some(ids) = self.ids_by_user.get_mut(&record.user_id) {
                ids.retain(|id| id != session_id);
                if ids.is_empty() {
                    self.ids_by_user.remove(&record.user_id);
                }
            }
        }
    }
}

/// In-memory refresh session storage. Keeps at most `max_per_user`
/// sessions per user, dropping the oldest when a new one starts.
pub struct MemorySessionStorage {
    tables: RwLock<SessionTables>,
    max_per_user: usize,
}

impl Default for MemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::with_max_per_user(MAX_SESSIONS_PER_USER)
    }

    pub fn with_max_per_user(max_per_user: usize) -> Self {
        Self {
            tables: RwLock::new(SessionTables::default()),
            max_per_user: max_per_user.max(1),
        }
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn start(&self, record: SessionRecord) -> Result<()> {
        let mut tables = self.tables.write().await;

        let evicted: Vec<String> = match tables.ids_by_user.get(&record.user_id) {
            Some(ids) if ids.len() >= self.max_per_user => {
                ids.iter().take(ids.len() + 1 - self.max_per_user).cloned().collect()
            }
            _ => Vec::new(),
        };
        for session_id in &evicted {
            tables.remove(session_id);
        }
        if !evicted.is_empty() {
            log::debug!(
                "Dropped {} oldest session(s) of user {}",
                evicted.len(),
                record.user_id
            );
        }

        tables
            .ids_by_user
            .entry(record.user_id.clone())
            .or_default()
            .push_back(record.session_id.clone());
        tables.by_id.insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn rotate(
        &self,
        session_id: &str,
        presented_refresh_id: &str,
        next_refresh_id: &str,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.by_id.get_mut(session_id) {
            Some(record) if record.refresh_id == presented_refresh_id => {
                record.refresh_id = next_refresh_id.to_string();
                record.rotated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn prune_idle(&self, rotated_before: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let idle: Vec<String> = tables
            .by_id
            .values()
            .filter(|record| record.rotated_at < rotated_before)
            .map(|record| record.session_id.clone())
            .collect();
        for session_id in &idle {
            tables.remove(session_id);
        }
        Ok(idle.len())
    }
}

/// Complete in-memory storage provider
#[derive(Default)]
pub struct MemoryStorageProvider {
    users: MemoryUserStorage,
    projects: MemoryProjectStorage,
    sessions: MemorySessionStorage,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn StorageProvider> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    fn user_storage(&self) -> &dyn UserStorage {
        &self.users
    }

    fn project_storage(&self) -> &dyn ProjectStorage {
        &self.projects
    }

    fn session_storage(&self) -> &dyn SessionStorage {
        &self.sessions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
