//! Project CRUD handlers. Every route here sits behind the auth gate.

use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::auth::user::Identity;
use crate::context::AppContext;
use crate::core::project::{NewProject, ProjectUpdate};

pub const PROJECT_DELETED: &str = "Project deleted.";

/// GET /projects
pub async fn list(identity: Identity, ctx: Arc<AppContext>) -> Result<impl Reply, Rejection> {
    let projects = ctx.projects.list(&identity).await?;
    Ok(warp::reply::json(&projects))
}

/// GET /projects/{id}
pub async fn get(id: String, identity: Identity, ctx: Arc<AppContext>) -> Result<impl Reply, Rejection> {
    let project = ctx.projects.get(&identity, &id).await?;
    Ok(warp::reply::json(&project))
}

/// POST /projects
pub async fn create(
    identity: Identity,
    new: NewProject,
    ctx: Arc<AppContext>,
) -> Result<impl Reply, Rejection> {
    let project = ctx.projects.create(&identity, new).await?;
    Ok(warp::reply::with_status(warp::reply::json(&project), StatusCode::CREATED))
}

/// PUT /projects/{id}
pub async fn update(
    id: String,
    identity: Identity,
    update: ProjectUpdate,
    ctx: Arc<AppContext>,
) -> Result<impl Reply, Rejection> {
    let project = ctx.projects.update(&identity, &id, update).await?;
    Ok(warp::reply::json(&project))
}

/// DELETE /projects/{id}
pub async fn delete(id: String, identity: Identity, ctx: Arc<AppContext>) -> Result<impl Reply, Rejection> {
    ctx.projects.delete(&identity, &id).await?;
    Ok(warp::reply::json(&json!({ "message": PROJECT_DELETED })))
}
