use std::error::Error;
use std::fmt;

use serde_json::Value;
use warp::http::StatusCode;

#[derive(Debug)]
pub enum ApiError {
    // Request errors
    ValidationFailed { message: String, data: Option<Value> },
    NotFound(String),

    // Auth errors
    Unauthenticated(String),
    InvalidToken(String),
    NotAuthorized(String),

    // Storage errors
    Conflict(String),

    // System errors
    ServerFault(String),
    ServerInconsistency(String),

    // Configuration errors
    Config(String),
}

impl ApiError {
    /// Validation failure without a field breakdown
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            data: None,
        }
    }

    /// HTTP status rendered for this error at the request boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationFailed { .. } | Self::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated(_) | Self::InvalidToken(_) | Self::NotAuthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::ServerFault(_) | Self::ServerInconsistency(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Internal details of server faults stay in the logs.
    pub fn public_message(&self) -> &str {
        match self {
            Self::ValidationFailed { message, .. } => message,
            Self::NotFound(msg)
            | Self::Unauthenticated(msg)
            | Self::InvalidToken(msg)
            | Self::NotAuthorized(msg)
            | Self::Conflict(msg)
            | Self::ServerInconsistency(msg) => msg,
            Self::ServerFault(_) | Self::Config(_) => "Internal server error.",
        }
    }

    /// Optional detail payload rendered under `data`
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::ValidationFailed { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed { message, .. } => write!(f, "Validation error: {}", message),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            Self::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            Self::NotAuthorized(msg) => write!(f, "Not authorized: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::ServerFault(msg) => write!(f, "Server fault: {}", msg),
            Self::ServerInconsistency(msg) => write!(f, "Server inconsistency: {}", msg),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for ApiError {}

impl warp::reject::Reject for ApiError {}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::ServerFault(format!("Blocking task failed: {}", err))
    }
}

// Generic result type for the API
pub type Result<T> = std::result::Result<T, ApiError>;
