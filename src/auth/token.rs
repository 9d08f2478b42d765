//! Access and refresh token issuance and verification.
//!
//! Both token families are RS256 JWTs signed by separate keypairs. An
//! access token lives one hour. A refresh token carries the exact access
//! token string it was issued with, which is what the refresh flow checks
//! to keep a pair together. Refresh tokens also name their session and
//! carry their own id so a rotated-away token can be told apart from the
//! current one.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::user::User;
use crate::config::{KeyPairPem, ServerConfig};
use crate::constants::ACCESS_TOKEN_TTL_SECS;
use crate::error::{ApiError, Result};

pub const INVALID_TOKEN: &str = "Invalid Token.";
pub const TOKEN_EXPIRED: &str = "Token expired.";

const ALGORITHM: Algorithm = Algorithm::RS256;

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// "First Last"
    pub username: String,
    pub email: String,
    /// Stable user id, the identity every protected handler works with
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Issued at (as UTC timestamp)
    pub iat: i64,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
    /// Unique token id; two access tokens are never byte-identical
    pub jti: String,
}

/// Refresh token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub email: String,
    /// The access token this refresh token was minted alongside, verbatim
    pub token: String,
    /// Session this token belongs to, fixed at signin
    pub sid: String,
    /// Id of this refresh token within its session
    pub jti: String,
    pub iat: i64,
    /// Only present when a refresh lifetime is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// A signed access token and the instant it stops being accepted
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Freshly minted access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_pem(keys: &KeyPairPem, family: &str) -> Result<Self> {
        let encoding = EncodingKey::from_rsa_pem(keys.private_pem.as_bytes()).map_err(|e| {
            ApiError::Config(format!("{} private key is not a usable RSA key: {}", family, e))
        })?;
        let decoding = DecodingKey::from_rsa_pem(keys.public_pem.as_bytes()).map_err(|e| {
            ApiError::Config(format!("{} public key is not a usable RSA key: {}", family, e))
        })?;

        // Sign a sample message so a private key paired with the wrong public key fails at startup
        let sample = format!("{}-keypair-check", family);
        let signature = jsonwebtoken::crypto::sign(sample.as_bytes(), &encoding, ALGORITHM)
            .map_err(|e| ApiError::Config(format!("{} key cannot sign: {}", family, e)))?;
        let matches = jsonwebtoken::crypto::verify(&signature, sample.as_bytes(), &decoding, ALGORITHM)
            .map_err(|e| ApiError::Config(format!("{} key cannot verify: {}", family, e)))?;
        if !matches {
            return Err(ApiError::Config(format!(
                "{} private and public keys do not belong to the same keypair",
                family
            )));
        }

        Ok(Self { encoding, decoding })
    }
}

/// Manages JWT token operations for both token families
pub struct TokenManager {
    access: SigningKeys,
    refresh: SigningKeys,
    access_validation: Validation,
    refresh_validation: Validation,
    refresh_ttl: Option<Duration>,
}

impl TokenManager {
    /// Creates a token manager from two distinct keypairs
    pub fn new(
        access_keys: &KeyPairPem,
        refresh_keys: &KeyPairPem,
        refresh_ttl: Option<std::time::Duration>,
    ) -> Result<Self> {
        let refresh_ttl = refresh_ttl
            .map(Duration::from_std)
            .transpose()
            .map_err(|e| ApiError::Config(format!("Refresh token lifetime out of range: {}", e)))?;

        let mut access_validation = Validation::new(ALGORITHM);
        access_validation.leeway = 0;

        // Refresh tokens may legitimately lack `exp`; when present it is still enforced.
        let mut refresh_validation = Validation::new(ALGORITHM);
        refresh_validation.leeway = 0;
        refresh_validation.required_spec_claims = HashSet::new();

        Ok(Self {
            access: SigningKeys::from_pem(access_keys, "Access token")?,
            refresh: SigningKeys::from_pem(refresh_keys, "Refresh token")?,
            access_validation,
            refresh_validation,
            refresh_ttl,
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::new(&config.access_keys, &config.refresh_keys, config.refresh_token_ttl)
    }

    /// Issues an access token valid for one hour from now
    pub fn issue_access_token(&self, user: &User) -> Result<IssuedAccessToken> {
        self.issue_access_token_at(user, Utc::now())
    }

    /// Issues an access token as if signed at `issued_at`
    pub fn issue_access_token_at(&self, user: &User, issued_at: DateTime<Utc>) -> Result<IssuedAccessToken> {
        let expires_at = issued_at + Duration::seconds(ACCESS_TOKEN_TTL_SECS);
        let claims = AccessClaims {
            username: user.display_name(),
            email: user.email.clone(),
            user_id: user.id.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.access.encoding)
            .map_err(|e| ApiError::ServerFault(format!("Failed to sign access token: {}", e)))?;

        Ok(IssuedAccessToken { token, expires_at })
    }

    /// Issues a refresh token bound to `access_token`, identified within
    /// `session_id` by `refresh_id`
    pub fn issue_refresh_token(
        &self,
        email: &str,
        access_token: &str,
        session_id: &str,
        refresh_id: &str,
    ) -> Result<String> {
        self.issue_refresh_token_at(email, access_token, session_id, refresh_id, Utc::now())
    }

    /// Issues a refresh token as if signed at `issued_at`
    pub fn issue_refresh_token_at(
        &self,
        email: &str,
        access_token: &str,
        session_id: &str,
        refresh_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = RefreshClaims {
            email: email.to_string(),
            token: access_token.to_string(),
            sid: session_id.to_string(),
            jti: refresh_id.to_string(),
            iat: issued_at.timestamp(),
            exp: self.refresh_ttl.map(|ttl| (issued_at + ttl).timestamp()),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.refresh.encoding)
            .map_err(|e| ApiError::ServerFault(format!("Failed to sign refresh token: {}", e)))
    }

    /// Issues an access token and the refresh token bound to it
    pub fn issue_pair(&self, user: &User, session_id: &str, refresh_id: &str) -> Result<TokenPair> {
        let access = self.issue_access_token(user)?;
        let refresh_token = self.issue_refresh_token(&user.email, &access.token, session_id, refresh_id)?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token,
            expires_at: access.expires_at,
        })
    }

    /// [`issue_pair`](Self::issue_pair) on the blocking pool; RSA signing is
    /// too slow to run on a reactor thread.
    pub async fn issue_pair_blocking(
        self: Arc<Self>,
        user: User,
        session_id: String,
        refresh_id: String,
    ) -> Result<TokenPair> {
        tokio::task::spawn_blocking(move || self.issue_pair(&user, &session_id, &refresh_id)).await?
    }

    /// Validates an access token and returns its claims
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims> {
        decode::<AccessClaims>(token, &self.access.decoding, &self.access_validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::InvalidToken(TOKEN_EXPIRED.to_string()),
                _ => {
                    log::debug!("Access token rejected: {}", e);
                    ApiError::InvalidToken(INVALID_TOKEN.to_string())
                }
            })
    }

    /// Validates a refresh token and returns its claims
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims> {
        decode::<RefreshClaims>(token, &self.refresh.decoding, &self.refresh_validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("Refresh token rejected: {}", e);
                ApiError::InvalidToken(INVALID_TOKEN.to_string())
            })
    }
}

/// Extracts bearer token from Authorization header. The scheme name is
/// case-insensitive.
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    let (scheme, token) = auth_header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(refresh_ttl: Option<std::time::Duration>) -> TokenManager {
        TokenManager::new(
            &KeyPairPem::new(
                include_str!("../../tests/fixtures/access_private.pem"),
                include_str!("../../tests/fixtures/access_public.pem"),
            ),
            &KeyPairPem::new(
                include_str!("../../tests/fixtures/refresh_private.pem"),
                include_str!("../../tests/fixtures/refresh_public.pem"),
            ),
            refresh_ttl,
        )
        .unwrap()
    }

    fn user() -> User {
        User::new("John".into(), "Doe".into(), "email@x.com".into(), String::new())
    }

    #[test]
    fn test_access_token_round_trip() {
        let manager = manager(None);
        let user = user();
        let issued = manager.issue_access_token(&user).unwrap();
        let claims = manager.verify_access_token(&issued.token).unwrap();

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.username, "John Doe");
        assert_eq!(claims.email, "email@x.com");
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL_SECS);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_access_token_header_is_rs256() {
        let issued = manager(None).issue_access_token(&user()).unwrap();
        let header = jsonwebtoken::decode_header(&issued.token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[test]
    fn test_access_token_valid_near_end_of_window() {
        let manager = manager(None);
        let issued_at = Utc::now() - Duration::seconds(ACCESS_TOKEN_TTL_SECS - 30);
        let issued = manager.issue_access_token_at(&user(), issued_at).unwrap();
        assert!(manager.verify_access_token(&issued.token).is_ok());
    }

    #[test]
    fn test_access_token_rejected_after_expiry() {
        let manager = manager(None);
        let issued_at = Utc::now() - Duration::seconds(ACCESS_TOKEN_TTL_SECS + 5);
        let issued = manager.issue_access_token_at(&user(), issued_at).unwrap();

        match manager.verify_access_token(&issued.token) {
            Err(ApiError::InvalidToken(msg)) => assert_eq!(msg, TOKEN_EXPIRED),
            other => panic!("expected expired token, got {:?}", other),
        }
    }

    #[test]
    fn test_refresh_token_embeds_access_token() {
        let manager = manager(None);
        let pair = manager.issue_pair(&user(), "session-1", "refresh-1").unwrap();
        let claims = manager.verify_refresh_token(&pair.refresh_token).unwrap();

        assert_eq!(claims.token, pair.access_token);
        assert_eq!(claims.email, "email@x.com");
        assert_eq!(claims.sid, "session-1");
        assert_eq!(claims.jti, "refresh-1");
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn test_access_tokens_issued_together_differ() {
        let manager = manager(None);
        let user = user();
        let now = Utc::now();
        let a = manager.issue_access_token_at(&user, now).unwrap();
        let b = manager.issue_access_token_at(&user, now).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_refresh_token_ttl_is_enforced_when_configured() {
        let manager = manager(Some(std::time::Duration::from_secs(60)));
        let fresh = manager.issue_refresh_token("email@x.com", "abc", "s1", "r1").unwrap();
        assert!(manager.verify_refresh_token(&fresh).unwrap().exp.is_some());

        let stale = manager
            .issue_refresh_token_at("email@x.com", "abc", "s1", "r1", Utc::now() - Duration::seconds(120))
            .unwrap();
        assert!(matches!(
            manager.verify_refresh_token(&stale),
            Err(ApiError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_token_families_are_not_interchangeable() {
        let manager = manager(None);
        let pair = manager.issue_pair(&user(), "session-1", "refresh-1").unwrap();

        assert!(manager.verify_refresh_token(&pair.access_token).is_err());
        assert!(manager.verify_access_token(&pair.refresh_token).is_err());
    }

    #[test]
    fn test_hs256_token_signed_with_public_key_is_rejected() {
        let manager = manager(None);
        let now = Utc::now().timestamp();
        let forged_claims = AccessClaims {
            username: "Mallory".into(),
            email: "m@x.com".into(),
            user_id: "victim".into(),
            iat: now,
            exp: now + 3600,
            jti: "forged".into(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &forged_claims,
            &EncodingKey::from_secret(include_bytes!("../../tests/fixtures/access_public.pem")),
        )
        .unwrap();

        assert!(manager.verify_access_token(&forged).is_err());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let manager = manager(None);
        let issued = manager.issue_access_token(&user()).unwrap();
        let (signed_part, signature) = issued.token.rsplit_once('.').unwrap();
        let replacement = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{}.{}{}", signed_part, replacement, &signature[1..]);

        match manager.verify_access_token(&tampered) {
            Err(ApiError::InvalidToken(msg)) => assert_eq!(msg, INVALID_TOKEN),
            other => panic!("expected invalid token, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_keypair_fails_at_startup() {
        let result = TokenManager::new(
            &KeyPairPem::new(
                include_str!("../../tests/fixtures/access_private.pem"),
                include_str!("../../tests/fixtures/refresh_public.pem"),
            ),
            &KeyPairPem::new(
                include_str!("../../tests/fixtures/refresh_private.pem"),
                include_str!("../../tests/fixtures/refresh_public.pem"),
            ),
            None,
        );
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi".to_string()));
        assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("abc.def.ghi"), None);
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        assert_eq!(extract_bearer_token("bearer abc.def.ghi"), Some("abc.def.ghi".to_string()));
        assert_eq!(extract_bearer_token("BEARER abc.def.ghi"), Some("abc.def.ghi".to_string()));
        assert_eq!(extract_bearer_token("BeArEr  abc.def.ghi"), Some("abc.def.ghi".to_string()));
        assert_eq!(extract_bearer_token("Bearerabc.def.ghi"), None);
    }
}
