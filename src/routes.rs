//! Route table

use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::constants::MAX_JSON_BODY_BYTES;
use crate::context::AppContext;
use crate::handlers::{auth, handle_rejection, projects, users, with_auth, with_context};
use crate::security::with_security_headers;

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BODY_BYTES).and(warp::body::json())
}

async fn health(ctx: Arc<AppContext>) -> Result<impl Reply, Rejection> {
    match ctx.storage.health_check().await {
        Ok(true) => Ok(warp::reply::with_status("OK", StatusCode::OK)),
        Ok(false) => Ok(warp::reply::with_status("UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// Every endpoint, with the error boundary and security headers applied.
///
/// Each route matches its path before its method, so an unknown path and
/// a known path with the wrong method both end up as 404 "Invalid URL".
pub fn api(ctx: Arc<AppContext>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let signup = warp::path!("signup")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(users::signup);

    let signin = warp::path!("auth" / "signin")
        .or(warp::path!("signin"))
        .unify()
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(auth::signin);

    let refresh = warp::path!("auth" / "refreshToken")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(auth::refresh_token);

    let list_projects = warp::path!("projects")
        .and(warp::get())
        .and(with_auth(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(projects::list);

    let get_project = warp::path!("projects" / String)
        .and(warp::get())
        .and(with_auth(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(projects::get);

    let create_project = warp::path!("projects")
        .and(warp::post())
        .and(with_auth(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(projects::create);

    let update_project = warp::path!("projects" / String)
        .and(warp::put())
        .and(with_auth(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(projects::update);

    let delete_project = warp::path!("projects" / String)
        .and(warp::delete())
        .and(with_auth(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(projects::delete);

    let health_route = warp::path!("health")
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(health);

    signup
        .or(signin)
        .or(refresh)
        .or(list_projects)
        .or(get_project)
        .or(create_project)
        .or(update_project)
        .or(delete_project)
        .or(health_route)
        .map(with_security_headers)
        .recover(handle_rejection)
        .unify()
        .with(warp::log("projects_api::http"))
}
