use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// A single field that blocked a wizard transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path of the field, e.g. `application.password`
    pub field: String,
    pub message: String,
}

/// Every field that failed validation for one transition attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Record `field` as missing when `value` is blank
    pub fn require_text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{} {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Rejection from the submission rate limiter
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rate limited, retry in {} ms", .wait.as_millis())]
pub struct RateLimitError {
    /// Time left until the minimum interval has elapsed (zero when blocked or at capacity)
    pub wait: Duration,
}

impl RateLimitError {
    pub fn remaining_ms(&self) -> u64 {
        self.wait.as_millis() as u64
    }
}

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Required wizard fields missing or malformed
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Submission gated by the rate limiter
    #[error("Rate limit exceeded: retry in {wait_ms} ms")]
    RateLimited { wait_ms: u64 },

    /// The execution collaborator reported a terminal error
    #[error("Execution error: {0}")]
    Execution(String),

    /// Operation not allowed in the current wizard state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unauthorized access
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        AppError::RateLimited {
            wait_ms: err.remaining_ms(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let mut builder = HttpResponse::build(status_code);

        match self {
            AppError::Validation(errors) => builder.json(serde_json::json!({
                "error": {
                    "message": "Validation failed",
                    "code": status_code.as_u16(),
                    "fields": errors,
                }
            })),
            AppError::RateLimited { wait_ms } => {
                let retry_after_secs = wait_ms.div_ceil(1000).max(1);
                builder
                    .insert_header(("Retry-After", retry_after_secs.to_string()))
                    .json(serde_json::json!({
                        "error": {
                            "message": "Rate limit exceeded",
                            "code": status_code.as_u16(),
                            "retry_after_ms": wait_ms,
                        }
                    }))
            }
            _ => builder.json(serde_json::json!({
                "error": {
                    "message": self.to_string(),
                    "code": status_code.as_u16(),
                }
            })),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Execution(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        AppError::InvalidTransition(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        AppError::Execution(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Field errors carried by a validation failure
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            AppError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
