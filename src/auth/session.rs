//! Signup, signin and token refresh.
//!
//! Signin opens a session and hands out the first token pair. Every
//! refresh checks that the presented pair belongs together, then rotates
//! both tokens and swaps the session's current refresh id so the old pair
//! is spent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::auth::password::PasswordHasher;
use crate::auth::token::{TokenManager, INVALID_TOKEN};
use crate::auth::user::{User, UserSummary};
use crate::constants::MIN_SIGNIN_MILLIS;
use crate::core::project::INVALID_PARAMETERS;
use crate::core::validation::{not_blank, password_length, validate_request};
use crate::error::{ApiError, Result};
use crate::security::{constant_time_eq, AuthTimer};
use crate::security_logger::{SecurityEvent, SecurityLogger};
use crate::storage::memory::EMAIL_TAKEN;
use crate::storage::StorageProvider;

pub const VALIDATION_FAILED: &str = "Validation Failed.";
pub const EMAIL_NOT_FOUND: &str = "Email not found.";
pub const INVALID_PASSWORD: &str = "Invalid password.";
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token.";

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(custom(function = "not_blank"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank"))]
    pub last_name: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "password_length"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SigninRequest {
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "password_length"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    /// The access token the client currently holds
    pub token: String,
    #[validate(custom(function = "not_blank"))]
    pub refresh_token: String,
}

/// Body returned by signin and refresh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub refresh_token: String,
    pub expiry_date: DateTime<Utc>,
    pub user_id: String,
    pub initials: String,
}

/// Server-side view of a signin session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    /// Id of the only refresh token currently accepted for this session
    pub refresh_id: String,
    pub rotated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session_id: String, user_id: String, refresh_id: String) -> Self {
        Self {
            session_id,
            user_id,
            refresh_id,
            rotated_at: Utc::now(),
        }
    }
}

pub struct SessionService {
    storage: Arc<dyn StorageProvider>,
    tokens: Arc<TokenManager>,
    passwords: PasswordHasher,
    security: Arc<SecurityLogger>,
    min_signin_duration: Duration,
}

impl SessionService {
    pub fn new(
        storage: Arc<dyn StorageProvider>,
        tokens: Arc<TokenManager>,
        passwords: PasswordHasher,
        security: Arc<SecurityLogger>,
    ) -> Self {
        Self {
            storage,
            tokens,
            passwords,
            security,
            min_signin_duration: Duration::from_millis(MIN_SIGNIN_MILLIS),
        }
    }

    /// Overrides the floor signin failures are padded to
    pub fn with_min_signin_duration(mut self, duration: Duration) -> Self {
        self.min_signin_duration = duration;
        self
    }

    /// Creates an account
    pub async fn signup(&self, request: SignupRequest) -> Result<UserSummary> {
        validate_request(&request, VALIDATION_FAILED)?;

        let users = self.storage.user_storage();
        if users.find_by_email(&request.email).await?.is_some() {
            return Err(ApiError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let password_hash = self.passwords.hash_blocking(request.password).await?;
        let user = User::new(
            request.first_name.trim().to_string(),
            request.last_name.trim().to_string(),
            request.email,
            password_hash,
        );

        // A concurrent signup for the same email still loses here
        users.save(user.clone()).await?;
        log::info!("User {} signed up", user.id);
        Ok(user.summary())
    }

    /// Checks credentials and opens a session
    pub async fn signin(&self, request: SigninRequest) -> Result<Session> {
        validate_request(&request, INVALID_PARAMETERS)?;

        let timer = AuthTimer::new(self.min_signin_duration);
        let result = self.check_credentials(request).await;
        if result.is_err() {
            timer.wait().await;
        }

        let user = result?;
        self.security
            .log_event(SecurityEvent::AuthenticationSuccess {
                user_id: user.id.clone(),
            })
            .await;
        self.open_session(user).await
    }

    async fn check_credentials(&self, request: SigninRequest) -> Result<User> {
        let Some(user) = self.storage.user_storage().find_by_email(&request.email).await? else {
            self.security
                .log_event(SecurityEvent::AuthenticationFailed {
                    user_id: None,
                    reason: "unknown email".to_string(),
                })
                .await;
            return Err(ApiError::Unauthenticated(EMAIL_NOT_FOUND.to_string()));
        };

        let valid = self
            .passwords
            .verify_blocking(request.password, user.password_hash.clone())
            .await?;
        if !valid {
            self.security
                .log_event(SecurityEvent::AuthenticationFailed {
                    user_id: Some(user.id.clone()),
                    reason: "wrong password".to_string(),
                })
                .await;
            return Err(ApiError::Unauthenticated(INVALID_PASSWORD.to_string()));
        }

        Ok(user)
    }

    /// Trades a matching access/refresh pair for a brand-new pair
    pub async fn refresh(&self, request: RefreshRequest) -> Result<Session> {
        validate_request(&request, INVALID_PARAMETERS)?;

        let claims = match self.tokens.verify_refresh_token(&request.refresh_token) {
            Ok(claims) => claims,
            Err(e) => {
                self.security
                    .log_event(SecurityEvent::TokenValidationFailed {
                        reason: "refresh token rejected".to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        if !constant_time_eq(&request.token, &claims.token) {
            self.security
                .log_event(SecurityEvent::RefreshPairMismatch {
                    user_email_known: !claims.email.is_empty(),
                })
                .await;
            return Err(ApiError::InvalidToken(INVALID_REFRESH_TOKEN.to_string()));
        }

        let user = self
            .storage
            .user_storage()
            .find_by_email(&claims.email)
            .await?
            .ok_or_else(|| {
                log::error!("Refresh token names an account that no longer exists");
                ApiError::ServerInconsistency(INVALID_TOKEN.to_string())
            })?;

        // Claim the rotation before signing so a racing refresh of the same
        // pair loses without ever seeing a token.
        let next_id = uuid::Uuid::new_v4().to_string();
        let sessions = self.storage.session_storage();
        if !sessions.rotate(&claims.sid, &claims.jti, &next_id).await? {
            self.security
                .log_event(SecurityEvent::TokenValidationFailed {
                    reason: "refresh token already rotated".to_string(),
                })
                .await;
            return Err(ApiError::InvalidToken(INVALID_REFRESH_TOKEN.to_string()));
        }

        let pair = match self
            .tokens
            .clone()
            .issue_pair_blocking(user.clone(), claims.sid.clone(), next_id.clone())
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                // Nothing was handed out, so the presented pair stays current
                if !sessions.rotate(&claims.sid, &next_id, &claims.jti).await? {
                    log::warn!("Could not restore session {} after a signing failure", claims.sid);
                }
                return Err(e);
            }
        };

        log::debug!("Session {} rotated for user {}", claims.sid, user.id);
        Ok(Session {
            token: pair.access_token,
            refresh_token: pair.refresh_token,
            expiry_date: pair.expires_at,
            user_id: user.id.clone(),
            initials: user.initials(),
        })
    }

    async fn open_session(&self, user: User) -> Result<Session> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let refresh_id = uuid::Uuid::new_v4().to_string();
        let pair = self
            .tokens
            .clone()
            .issue_pair_blocking(user.clone(), session_id.clone(), refresh_id.clone())
            .await?;

        self.storage
            .session_storage()
            .start(SessionRecord::new(session_id, user.id.clone(), refresh_id))
            .await?;

        Ok(Session {
            token: pair.access_token,
            refresh_token: pair.refresh_token,
            expiry_date: pair.expires_at,
            user_id: user.id.clone(),
            initials: user.initials(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordPolicy;
    use crate::config::KeyPairPem;
    use crate::constants::MAX_SESSIONS_PER_USER;
    use crate::storage::MemoryStorageProvider;

    fn service() -> SessionService {
        let tokens = TokenManager::new(
            &KeyPairPem::new(
                include_str!("../../tests/fixtures/access_private.pem"),
                include_str!("../../tests/fixtures/access_public.pem"),
            ),
            &KeyPairPem::new(
                include_str!("../../tests/fixtures/refresh_private.pem"),
                include_str!("../../tests/fixtures/refresh_public.pem"),
            ),
            None,
        )
        .unwrap();
        SessionService::new(
            MemoryStorageProvider::shared(),
            Arc::new(tokens),
            PasswordHasher::new(PasswordPolicy::minimal()),
            Arc::new(SecurityLogger::new()),
        )
        .with_min_signin_duration(Duration::from_millis(5))
    }

    fn john() -> SignupRequest {
        SignupRequest {
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: "email@x.com".into(),
            password: "123456".into(),
        }
    }

    fn credentials(password: &str) -> SigninRequest {
        SigninRequest {
            email: "email@x.com".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_signin() {
        let service = service();
        let summary = service.signup(john()).await.unwrap();
        assert_eq!(summary.email, "email@x.com");

        let session = service.signin(credentials("123456")).await.unwrap();
        assert_eq!(session.user_id, summary.id);
        assert_eq!(session.initials, "JD");
        assert!(!session.token.is_empty());
        assert!(!session.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_stored_password_is_hashed() {
        let service = service();
        service.signup(john()).await.unwrap();
        let stored = service
            .storage
            .user_storage()
            .find_by_email("email@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, "123456");
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_conflict() {
        let service = service();
        service.signup(john()).await.unwrap();
        match service.signup(john()).await {
            Err(ApiError::Conflict(msg)) => assert_eq!(msg, EMAIL_TAKEN),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let request = SignupRequest {
            first_name: " ".into(),
            password: "123".into(),
            ..john()
        };
        match service().signup(request).await {
            Err(ApiError::ValidationFailed { message, data }) => {
                assert_eq!(message, VALIDATION_FAILED);
                assert_eq!(data.unwrap().as_array().unwrap().len(), 2);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signup_rejects_malformed_email() {
        let request = SignupRequest {
            email: "<>(),;:@x.com".into(),
            ..john()
        };
        match service().signup(request).await {
            Err(ApiError::ValidationFailed { data, .. }) => {
                assert_eq!(data.unwrap()[0]["field"], "email");
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signin_failures_are_distinct() {
        let service = service();
        service.signup(john()).await.unwrap();

        match service.signin(credentials("1234567")).await {
            Err(ApiError::Unauthenticated(msg)) => assert_eq!(msg, INVALID_PASSWORD),
            other => panic!("expected wrong password, got {:?}", other),
        }

        let unknown = SigninRequest {
            email: "nobody@x.com".into(),
            password: "123456".into(),
        };
        match service.signin(unknown).await {
            Err(ApiError::Unauthenticated(msg)) => assert_eq!(msg, EMAIL_NOT_FOUND),
            other => panic!("expected unknown email, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signin_failure_is_padded() {
        let service = service().with_min_signin_duration(Duration::from_millis(40));
        let start = std::time::Instant::now();
        let _ = service.signin(credentials("123456")).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_spends_old_pair() {
        let service = service();
        service.signup(john()).await.unwrap();
        let first = service.signin(credentials("123456")).await.unwrap();

        let old_pair = RefreshRequest {
            token: first.token.clone(),
            refresh_token: first.refresh_token.clone(),
        };
        let second = service.refresh(old_pair.clone()).await.unwrap();
        assert_ne!(second.token, first.token);
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(second.user_id, first.user_id);

        match service.refresh(old_pair).await {
            Err(ApiError::InvalidToken(msg)) => assert_eq!(msg, INVALID_REFRESH_TOKEN),
            other => panic!("expected spent pair to fail, got {:?}", other),
        }

        // The new pair keeps working
        let third = service
            .refresh(RefreshRequest {
                token: second.token,
                refresh_token: second.refresh_token,
            })
            .await
            .unwrap();
        assert!(!third.token.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rejects_pairs_from_different_sessions() {
        let service = service();
        service.signup(john()).await.unwrap();
        let a = service.signin(credentials("123456")).await.unwrap();
        let b = service.signin(credentials("123456")).await.unwrap();

        let mixed = RefreshRequest {
            token: a.token,
            refresh_token: b.refresh_token,
        };
        match service.refresh(mixed).await {
            Err(ApiError::InvalidToken(msg)) => assert_eq!(msg, INVALID_REFRESH_TOKEN),
            other => panic!("expected pairing failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oldest_session_is_dropped_past_the_per_user_cap() {
        let service = service();
        service.signup(john()).await.unwrap();

        let mut sessions = Vec::new();
        for _ in 0..=MAX_SESSIONS_PER_USER {
            sessions.push(service.signin(credentials("123456")).await.unwrap());
        }

        let oldest = sessions.first().unwrap().clone();
        match service
            .refresh(RefreshRequest {
                token: oldest.token,
                refresh_token: oldest.refresh_token,
            })
            .await
        {
            Err(ApiError::InvalidToken(msg)) => assert_eq!(msg, INVALID_REFRESH_TOKEN),
            other => panic!("expected evicted session to fail, got {:?}", other),
        }

        let latest = sessions.pop().unwrap();
        assert!(service
            .refresh(RefreshRequest {
                token: latest.token,
                refresh_token: latest.refresh_token,
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_refresh_with_garbage_token() {
        let request = RefreshRequest {
            token: String::new(),
            refresh_token: "not.a.jwt".into(),
        };
        match service().refresh(request).await {
            Err(ApiError::InvalidToken(msg)) => assert_eq!(msg, INVALID_TOKEN),
            other => panic!("expected invalid token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_token() {
        let result = service().refresh(RefreshRequest::default()).await;
        assert!(matches!(result, Err(ApiError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn test_refresh_for_deleted_user_is_inconsistency() {
        let service = service();
        let summary = service.signup(john()).await.unwrap();
        let session = service.signin(credentials("123456")).await.unwrap();
        service
            .storage
            .user_storage()
            .delete_by_id(&summary.id)
            .await
            .unwrap();

        let result = service
            .refresh(RefreshRequest {
                token: session.token,
                refresh_token: session.refresh_token,
            })
            .await;
        assert!(matches!(result, Err(ApiError::ServerInconsistency(_))));
    }
}
