//! The single place where failures become HTTP responses

use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{InvalidHeader, LengthRequired, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType};
use warp::reply::Response;
use warp::Rejection;

use crate::auth::token::INVALID_TOKEN;
use crate::core::project::INVALID_PARAMETERS;
use crate::error::ApiError;
use crate::security::with_security_headers;

pub const INVALID_URL: &str = "Invalid URL";

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

fn render(status: StatusCode, message: &str, data: Option<&Value>) -> Response {
    let body = warp::reply::json(&ErrorBody { message, data });
    with_security_headers(warp::reply::with_status(body, status))
}

/// Recover handler rendering every rejection as `{message, data?}`
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(api_error) = err.find::<ApiError>() {
        match api_error {
            ApiError::ServerFault(_) | ApiError::ServerInconsistency(_) | ApiError::Config(_) => {
                log::error!("Request failed: {}", api_error);
            }
            _ => log::debug!("Request rejected: {}", api_error),
        }
        return Ok(render(
            api_error.status_code(),
            api_error.public_message(),
            api_error.data(),
        ));
    }

    // Route-specific rejections first: a combined rejection may also hold
    // the 404/405 of every route that did not match.
    if let Some(e) = err.find::<BodyDeserializeError>() {
        log::debug!("Malformed request body: {}", e);
        return Ok(render(StatusCode::UNPROCESSABLE_ENTITY, INVALID_PARAMETERS, None));
    }
    if err.find::<UnsupportedMediaType>().is_some() {
        return Ok(render(StatusCode::UNPROCESSABLE_ENTITY, INVALID_PARAMETERS, None));
    }
    if err.find::<PayloadTooLarge>().is_some() {
        return Ok(render(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large.", None));
    }
    if err.find::<LengthRequired>().is_some() {
        return Ok(render(StatusCode::LENGTH_REQUIRED, "Content length required.", None));
    }
    if let Some(e) = err.find::<InvalidHeader>() {
        if e.name().eq_ignore_ascii_case("authorization") {
            return Ok(render(StatusCode::UNAUTHORIZED, INVALID_TOKEN, None));
        }
        return Ok(render(StatusCode::BAD_REQUEST, INVALID_PARAMETERS, None));
    }

    if err.is_not_found() || err.find::<MethodNotAllowed>().is_some() {
        return Ok(render(StatusCode::NOT_FOUND, INVALID_URL, None));
    }

    log::error!("Unhandled rejection: {:?}", err);
    Ok(render(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error.",
        None,
    ))
}
