use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::auth::session::SignupRequest;
use crate::context::AppContext;

/// POST /signup
pub async fn signup(request: SignupRequest, ctx: Arc<AppContext>) -> Result<impl Reply, Rejection> {
    let summary = ctx.sessions.signup(request).await?;
    Ok(warp::reply::with_status(warp::reply::json(&summary), StatusCode::CREATED))
}
