//! Auth gate and the signin/refresh endpoints

use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::auth::session::{RefreshRequest, SigninRequest};
use crate::auth::token::{extract_bearer_token, TokenManager, INVALID_TOKEN};
use crate::auth::user::Identity;
use crate::constants::MAX_BEARER_TOKEN_LEN;
use crate::context::AppContext;
use crate::error::{ApiError, Result};
use crate::security_logger::SecurityEvent;

pub const NOT_AUTHENTICATED: &str = "Not authenticated.";

/// Resolve the caller from the raw `Authorization` header value.
///
/// Pure token work: the store is never consulted, so a token stays usable
/// for its whole lifetime even if the account changes meanwhile.
pub fn authenticate_request(auth_header: Option<String>, tokens: &TokenManager) -> Result<Identity> {
    let header = match auth_header {
        Some(header) if !header.trim().is_empty() => header,
        _ => return Err(ApiError::Unauthenticated(NOT_AUTHENTICATED.to_string())),
    };

    let token = extract_bearer_token(&header)
        .ok_or_else(|| ApiError::InvalidToken(INVALID_TOKEN.to_string()))?;

    if token.len() > MAX_BEARER_TOKEN_LEN || token.chars().any(|c| c.is_control()) {
        return Err(ApiError::InvalidToken(INVALID_TOKEN.to_string()));
    }

    let claims = tokens.verify_access_token(&token)?;
    if claims.user_id.trim().is_empty() {
        return Err(ApiError::Unauthenticated(NOT_AUTHENTICATED.to_string()));
    }

    Ok(Identity {
        user_id: claims.user_id,
        username: claims.username,
        email: claims.email,
    })
}

pub fn with_context(
    ctx: Arc<AppContext>,
) -> impl Filter<Extract = (Arc<AppContext>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Extracts the authenticated [`Identity`] or rejects the request
pub fn with_auth(ctx: Arc<AppContext>) -> impl Filter<Extract = (Identity,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_context(ctx))
        .and_then(|header: Option<String>, ctx: Arc<AppContext>| async move {
            match authenticate_request(header, &ctx.tokens) {
                Ok(identity) => Ok(identity),
                Err(e) => {
                    if let ApiError::InvalidToken(reason) = &e {
                        ctx.security
                            .log_event(SecurityEvent::TokenValidationFailed {
                                reason: reason.clone(),
                            })
                            .await;
                    }
                    Err(warp::reject::custom(e))
                }
            }
        })
}

/// POST /auth/signin
pub async fn signin(request: SigninRequest, ctx: Arc<AppContext>) -> std::result::Result<impl Reply, Rejection> {
    let session = ctx.sessions.signin(request).await?;
    Ok(warp::reply::with_status(warp::reply::json(&session), StatusCode::OK))
}

/// POST /auth/refreshToken
pub async fn refresh_token(
    request: RefreshRequest,
    ctx: Arc<AppContext>,
) -> std::result::Result<impl Reply, Rejection> {
    let session = ctx.sessions.refresh(request).await?;
    Ok(warp::reply::with_status(warp::reply::json(&session), StatusCode::OK))
}
