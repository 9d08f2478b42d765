//! Shared application state handed to every route

use std::sync::Arc;
use std::time::Duration;

use crate::auth::password::PasswordHasher;
use crate::auth::session::SessionService;
use crate::auth::token::TokenManager;
use crate::config::ServerConfig;
use crate::constants::{MAINTENANCE_INTERVAL_SECS, SECURITY_EVENT_RETENTION_SECS};
use crate::core::project::ProjectService;
use crate::error::Result;
use crate::security_logger::{SecurityEvent, SecurityLogger};
use crate::storage::{self, StorageProvider};

pub struct AppContext {
    pub storage: Arc<dyn StorageProvider>,
    pub tokens: Arc<TokenManager>,
    pub security: Arc<SecurityLogger>,
    pub sessions: SessionService,
    pub projects: ProjectService,
    /// Sessions idle this long hold only expired refresh tokens
    session_idle_limit: Option<chrono::Duration>,
}

impl AppContext {
    /// Builds the context, opening the store named in the configuration
    pub async fn from_config(config: &ServerConfig) -> Result<Arc<Self>> {
        let storage = storage::open(&config.store_url)?;
        Self::with_storage(config, storage).await
    }

    /// Builds the context around an already opened store
    pub async fn with_storage(config: &ServerConfig, storage: Arc<dyn StorageProvider>) -> Result<Arc<Self>> {
        let security = Arc::new(SecurityLogger::new());

        let tokens = match TokenManager::from_config(config) {
            Ok(tokens) => Arc::new(tokens),
            Err(e) => {
                security
                    .log_event(SecurityEvent::ConfigurationError {
                        component: "token_manager".to_string(),
                        error: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        let sessions = SessionService::new(
            storage.clone(),
            tokens.clone(),
            PasswordHasher::new(config.password_policy),
            security.clone(),
        );
        let projects = ProjectService::new(storage.clone(), security.clone());
        let session_idle_limit = config
            .refresh_token_ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok());

        Ok(Arc::new(Self {
            storage,
            tokens,
            security,
            sessions,
            projects,
            session_idle_limit,
        }))
    }

    /// One cleanup pass: old security events, and sessions whose refresh
    /// token can no longer be valid
    pub async fn run_maintenance(&self) -> Result<usize> {
        self.security
            .cleanup_old_events(Duration::from_secs(SECURITY_EVENT_RETENTION_SECS))
            .await;

        let Some(idle_limit) = self.session_idle_limit else {
            return Ok(0);
        };
        let pruned = self
            .storage
            .session_storage()
            .prune_idle(chrono::Utc::now() - idle_limit)
            .await?;
        if pruned > 0 {
            log::info!("Pruned {} idle refresh session(s)", pruned);
        }
        Ok(pruned)
    }

    /// Start periodic cleanup task
    pub fn start_maintenance_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(MAINTENANCE_INTERVAL_SECS));
            loop {
                interval.tick().await;
                if let Err(e) = self.run_maintenance().await {
                    log::warn!("Maintenance pass failed: {}", e);
                }
            }
        });
    }
}
