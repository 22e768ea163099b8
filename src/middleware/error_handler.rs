use actix_web::{
    error::{JsonPayloadError, PathError},
    HttpRequest,
};

use crate::core::{AppError, ValidationErrors};

/// Maps malformed JSON bodies onto the same error shape as field validation
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected request body");

    let mut errors = ValidationErrors::new();
    errors.push("body", err.to_string());
    AppError::Validation(errors).into()
}

/// Unparseable path segments, such as a malformed session id, are not found
pub fn path_error_handler(err: PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected request path");
    AppError::not_found(req.path().to_string()).into()
}
