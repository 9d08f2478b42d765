#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;

use projects_api::auth::password::PasswordPolicy;
use projects_api::config::{KeyPairPem, ServerConfig};
use projects_api::context::AppContext;

pub const ACCESS_PRIVATE: &str = include_str!("../fixtures/access_private.pem");
pub const ACCESS_PUBLIC: &str = include_str!("../fixtures/access_public.pem");
pub const REFRESH_PRIVATE: &str = include_str!("../fixtures/refresh_private.pem");
pub const REFRESH_PUBLIC: &str = include_str!("../fixtures/refresh_public.pem");

/// Configuration with the fixture keypairs and the cheapest Argon2 profile
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::with_keys(
        KeyPairPem::new(ACCESS_PRIVATE, ACCESS_PUBLIC),
        KeyPairPem::new(REFRESH_PRIVATE, REFRESH_PUBLIC),
    )
    .expect("fixture keys are valid");
    config.password_policy = PasswordPolicy::minimal();
    config
}

pub async fn test_context() -> Arc<AppContext> {
    AppContext::from_config(&test_config())
        .await
        .expect("context builds from fixtures")
}

/// Sends one request through the full route table, returning status and JSON body
pub async fn call(
    ctx: &Arc<AppContext>,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let api = projects_api::routes::api(ctx.clone());
    let mut request = warp::test::request().method(method).path(path);
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {}", token));
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.reply(&api).await;
    let status = response.status();
    let body = if response.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(response.body()).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(response.body()).into_owned())
        })
    };
    (status, body)
}

pub fn signup_body(first: &str, last: &str, email: &str, password: &str) -> Value {
    json!({ "firstName": first, "lastName": last, "email": email, "password": password })
}

/// Signs up and signs in, returning the session body
pub async fn register_and_signin(ctx: &Arc<AppContext>, email: &str) -> Value {
    let (status, _) = call(
        ctx,
        "POST",
        "/signup",
        None,
        Some(signup_body("John", "Doe", email, "123456")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, session) = call(
        ctx,
        "POST",
        "/auth/signin",
        None,
        Some(json!({ "email": email, "password": "123456" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    session
}

pub fn token_of(session: &Value) -> String {
    session["token"].as_str().unwrap_or_default().to_string()
}

pub fn refresh_of(session: &Value) -> String {
    session["refreshToken"].as_str().unwrap_or_default().to_string()
}
