//! Domain model and request validation

pub mod project;
pub mod validation;

pub use project::{NewProject, Project, ProjectService, ProjectUpdate};
pub use validation::{validate_request, FieldError};
