//! Project resource and its service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::auth::ownership::ensure_owner;
use crate::auth::user::Identity;
use crate::core::validation::{project_content, project_title, validate_request};
use crate::error::{ApiError, Result};
use crate::security_logger::{SecurityEvent, SecurityLogger};
use crate::storage::StorageProvider;

pub const NO_PROJECT_FOUND: &str = "No project found.";
pub const PROJECT_NOT_FOUND: &str = "Project not found.";
pub const INVALID_ID: &str = "Invalid ID.";
pub const INVALID_PARAMETERS: &str = "Invalid parameters.";

/// A project owned by exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    /// Set once at creation, never rewritten
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn create(new: NewProject, owner_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            content: new.content,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the present fields of `update` and bumps `updated_at`
    pub fn apply(&mut self, update: ProjectUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        self.updated_at = Utc::now();
    }
}

/// Body of `POST /projects`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewProject {
    #[serde(default)]
    #[validate(custom(function = "project_title"))]
    pub title: String,
    #[serde(default)]
    #[validate(custom(function = "project_content"))]
    pub content: String,
}

impl NewProject {
    /// Checks length rules and returns the trimmed values
    pub fn validated(self) -> Result<Self> {
        validate_request(&self, INVALID_PARAMETERS)?;
        Ok(Self {
            title: self.title.trim().to_string(),
            content: self.content.trim().to_string(),
        })
    }
}

/// Body of `PUT /projects/{id}`. The owner is not part of it and cannot change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProjectUpdate {
    #[validate(custom(function = "project_title"))]
    pub title: Option<String>,
    #[validate(custom(function = "project_content"))]
    pub content: Option<String>,
}

impl ProjectUpdate {
    pub fn validated(self) -> Result<Self> {
        validate_request(&self, INVALID_PARAMETERS)?;
        Ok(Self {
            title: self.title.map(|t| t.trim().to_string()),
            content: self.content.map(|c| c.trim().to_string()),
        })
    }
}

/// Rejects path ids that cannot name a project
pub fn parse_project_id(raw: &str) -> Result<String> {
    uuid::Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::validation(INVALID_ID))
}

/// Project operations for an authenticated caller
pub struct ProjectService {
    storage: Arc<dyn StorageProvider>,
    security: Arc<SecurityLogger>,
}

impl ProjectService {
    pub fn new(storage: Arc<dyn StorageProvider>, security: Arc<SecurityLogger>) -> Self {
        Self { storage, security }
    }

    /// All projects owned by the caller, oldest first
    pub async fn list(&self, identity: &Identity) -> Result<Vec<Project>> {
        let projects = self
            .storage
            .project_storage()
            .list_by_owner(&identity.user_id)
            .await?;
        if projects.is_empty() {
            return Err(ApiError::NotFound(NO_PROJECT_FOUND.to_string()));
        }
        Ok(projects)
    }

    /// One project, looked up within the caller's own projects
    pub async fn get(&self, identity: &Identity, raw_id: &str) -> Result<Project> {
        let id = parse_project_id(raw_id)?;
        self.storage
            .project_storage()
            .find_owned(&id, &identity.user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(NO_PROJECT_FOUND.to_string()))
    }

    pub async fn create(&self, identity: &Identity, new: NewProject) -> Result<Project> {
        let new = new.validated()?;

        // Best-effort referential check; the owner could still vanish afterwards.
        if self
            .storage
            .user_storage()
            .find_by_id(&identity.user_id)
            .await?
            .is_none()
        {
            return Err(ApiError::NotFound("User not found.".to_string()));
        }

        let project = Project::create(new, identity.user_id.clone());
        self.storage.project_storage().save(project.clone()).await?;
        log::info!("Project {} created by user {}", project.id, identity.user_id);
        Ok(project)
    }

    pub async fn update(&self, identity: &Identity, raw_id: &str, update: ProjectUpdate) -> Result<Project> {
        let update = update.validated()?;
        let id = parse_project_id(raw_id)?;

        let mut project = self
            .storage
            .project_storage()
            .find_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::NotFound(NO_PROJECT_FOUND.to_string()))?;
        self.check_owner(identity, &project, "update").await?;

        project.apply(update);
        self.storage.project_storage().save(project.clone()).await?;
        log::info!("Project {} updated by user {}", project.id, identity.user_id);
        Ok(project)
    }

    pub async fn delete(&self, identity: &Identity, raw_id: &str) -> Result<()> {
        let id = parse_project_id(raw_id)?;

        let project = self
            .storage
            .project_storage()
            .find_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::NotFound(PROJECT_NOT_FOUND.to_string()))?;
        self.check_owner(identity, &project, "delete").await?;

        if !self.storage.project_storage().delete_by_id(&id).await? {
            return Err(ApiError::NotFound(PROJECT_NOT_FOUND.to_string()));
        }
        log::info!("Project {} deleted by user {}", id, identity.user_id);
        Ok(())
    }

    async fn check_owner(&self, identity: &Identity, project: &Project, action: &str) -> Result<()> {
        if let Err(e) = ensure_owner(identity, project) {
            self.security
                .log_event(SecurityEvent::PermissionDenied {
                    user_id: identity.user_id.clone(),
                    action: action.to_string(),
                    resource: project.id.clone(),
                })
                .await;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_is_trimmed() {
        let new = NewProject {
            title: "  project's title ".into(),
            content: "\tproject's content\n".into(),
        }
        .validated()
        .unwrap();
        assert_eq!(new.title, "project's title");
        assert_eq!(new.content, "project's content");
    }

    #[test]
    fn test_new_project_rules() {
        let result = NewProject {
            title: "abc".into(),
            content: "too short".into(),
        }
        .validated();
        match result {
            Err(ApiError::ValidationFailed { message, data }) => {
                assert_eq!(message, INVALID_PARAMETERS);
                assert_eq!(data.unwrap().as_array().unwrap().len(), 2);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_update_fields_are_optional() {
        assert!(ProjectUpdate::default().validated().is_ok());
        let update = ProjectUpdate {
            title: Some("title test".into()),
            content: None,
        };
        assert!(update.validated().is_ok());
        let update = ProjectUpdate {
            title: None,
            content: Some("short".into()),
        };
        assert!(update.validated().is_err());
        let update = ProjectUpdate {
            title: Some("   ".into()),
            content: None,
        };
        assert!(update.validated().is_err());
    }

    #[test]
    fn test_apply_keeps_owner_and_advances_updated_at() {
        let mut project = Project::create(
            NewProject {
                title: "project's title".into(),
                content: "project's content".into(),
            },
            "owner-1".into(),
        );
        let created_at = project.created_at;
        project.apply(ProjectUpdate {
            title: Some("title test".into()),
            content: None,
        });

        assert_eq!(project.title, "title test");
        assert_eq!(project.content, "project's content");
        assert_eq!(project.owner_id, "owner-1");
        assert_eq!(project.created_at, created_at);
        assert!(project.updated_at >= created_at);
    }

    #[test]
    fn test_project_json_shape() {
        let project = Project::create(NewProject::default(), "owner-1".into());
        let json = serde_json::to_value(&project).unwrap();
        assert!(json.get("_id").is_some());
        assert_eq!(json["ownerId"], "owner-1");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_parse_project_id() {
        assert!(parse_project_id("not-an-id").is_err());
        let id = uuid::Uuid::new_v4().to_string();
        assert_eq!(parse_project_id(&id).unwrap(), id);
    }
}
