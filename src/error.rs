// Error handling module for the account API
// Provides the HTTP-facing error taxonomy and response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Main error type for the API
/// All handlers return Result<T, ApiError>
///
/// Each variant maps to one fixed HTTP status code.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or missing request fields
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Request understood but rejected by a domain rule (e.g. already verified)
    /// Maps to HTTP 400 Bad Request
    BadRequest(String),

    /// Resource not found by ID or email
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Duplicate resource conflict
    /// Maps to HTTP 409 Conflict
    Conflict { message: String },

    /// Missing, invalid, expired or wrong-type credentials
    /// Maps to HTTP 401 Unauthorized
    Unauthorized(String),

    /// Authenticated but not allowed (wrong password, wrong code, missing rights)
    /// Maps to HTTP 403 Forbidden
    Forbidden(String),

    /// Downstream dependency (email provider) failure
    /// Maps to HTTP 500 Internal Server Error
    DependencyError(String),

    /// Database operation errors
    /// Maps to HTTP 500 Internal Server Error
    /// Sensitive details are filtered from client responses
    DatabaseError(String),

    /// Internal server errors
    /// Maps to HTTP 500 Internal Server Error
    InternalError(String),
}

/// Consistent error response structure
///
/// Provides both a machine-readable `error_code` and a human-readable `message`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR", "NOT_FOUND")
    pub error_code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (e.g., field-level validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// RFC 3339 timestamp of when the error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    fn new(error_code: &str, message: String) -> Self {
        Self {
            error_code: error_code.to_string(),
            message,
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse
    ///
    /// Logs at error! for 500-level, warn! for security-relevant 4xx and
    /// debug! for expected client errors.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);

                let mut response =
                    ErrorResponse::new("VALIDATION_ERROR", "Request validation failed".to_string());
                response.details =
                    Some(serde_json::to_value(errors).unwrap_or(serde_json::json!({})));
                (StatusCode::BAD_REQUEST, response)
            }
            ApiError::BadRequest(message) => {
                debug!("Bad request: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("BAD_REQUEST", message.clone()),
                )
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} {}", resource, id);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("NOT_FOUND", format!("{} {} not found", resource, id)),
                )
            }
            ApiError::Conflict { message } => {
                warn!("Conflict error: {}", message);
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::new("CONFLICT", message.clone()),
                )
            }
            ApiError::Unauthorized(message) => {
                warn!("Unauthorized access attempt: {}", message);
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new("UNAUTHORIZED", message.clone()),
                )
            }
            ApiError::Forbidden(message) => {
                warn!("Forbidden access attempt: {}", message);
                (
                    StatusCode::FORBIDDEN,
                    ErrorResponse::new("FORBIDDEN", message.clone()),
                )
            }
            ApiError::DependencyError(detail) => {
                error!("Dependency error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "DEPENDENCY_ERROR",
                        "An upstream service failed".to_string(),
                    ),
                )
            }
            ApiError::DatabaseError(detail) => {
                error!("Database error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("DATABASE_ERROR", "A database error occurred".to_string()),
                )
            }
            ApiError::InternalError(detail) => {
                error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "INTERNAL_ERROR",
                        "An internal server error occurred".to_string(),
                    ),
                )
            }
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::DependencyError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert validator errors to ApiError
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}
