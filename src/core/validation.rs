//! Request validation on top of `validator` derives.
//!
//! Every failing field is reported, not just the first, so the client gets
//! the full list under `data` in a single 422.

use serde::Serialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::constants::{MIN_PASSWORD_LEN, MIN_PROJECT_CONTENT_LEN, MIN_PROJECT_TITLE_LEN};
use crate::error::{ApiError, Result};

/// One failed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Runs the derived rules of `request`. Failures become a 422 carrying `message`.
pub fn validate_request<T: Validate>(request: &T, message: &str) -> Result<()> {
    request.validate().map_err(|errors| ApiError::ValidationFailed {
        message: message.to_string(),
        data: serde_json::to_value(field_errors(&errors)).ok(),
    })
}

/// Flattens `errors` into `{field, message}` pairs named as the client sent
/// them, ordered by field name.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut flat: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            let field = camel_case(&field);
            failures.iter().map(move |failure| FieldError {
                message: failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field)),
                field: field.clone(),
            })
        })
        .collect();
    flat.sort_by(|a, b| a.field.cmp(&b.field));
    flat
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn failure(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(message));
    error
}

pub fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(failure("required", "must not be blank".to_string()));
    }
    Ok(())
}

/// Passwords are measured as sent, whitespace included
pub fn password_length(value: &str) -> std::result::Result<(), ValidationError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(failure(
            "length",
            format!("password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

fn trimmed_min(value: &str, field: &str, min: usize) -> std::result::Result<(), ValidationError> {
    if value.trim().chars().count() < min {
        return Err(failure(
            "length",
            format!("{} must be at least {} characters", field, min),
        ));
    }
    Ok(())
}

pub fn project_title(value: &str) -> std::result::Result<(), ValidationError> {
    trimmed_min(value, "title", MIN_PROJECT_TITLE_LEN)
}

pub fn project_content(value: &str) -> std::result::Result<(), ValidationError> {
    trimmed_min(value, "content", MIN_PROJECT_CONTENT_LEN)
}
