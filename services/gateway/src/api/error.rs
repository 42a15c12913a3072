//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every rejection the
//! gateway produces has the same JSON shape.
//!
//! # Key invariants and assumptions
//! - Error responses include a stable `code` and human-readable `message`.
//! - Each enforcement failure class maps to exactly one status code.
//!
//! # Security considerations
//! - Credential failures never echo token contents or validation details.
//! - Internal and upstream failures log details server-side but return
//!   generic messages.
use crate::api::types::ErrorResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use lbac_authz::{EnforceError, FailureKind};

/// Structured API error returned by handlers and middleware.
///
/// # Invariants
/// - `status` must match the semantics of `body.code`.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use gateway::api::error::ApiError;
/// use gateway::api::types::ErrorResponse;
///
/// let err = ApiError {
///     status: StatusCode::NOT_FOUND,
///     body: ErrorResponse {
///         code: "not_found".to_string(),
///         message: "missing".to_string(),
///         request_id: None,
///     },
/// };
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

/// Build a 401 Unauthorized error.
pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

/// Build a 404 Not Found error.
pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 500 Internal Server Error with a generic message.
pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<EnforceError> for ApiError {
    fn from(err: EnforceError) -> Self {
        match err.kind() {
            FailureKind::MissingCredential => api_unauthorized("missing identity assertion"),
            FailureKind::InvalidCredential => api_unauthorized("invalid identity assertion"),
            FailureKind::Internal => api_internal_message("identity assertion claims unusable"),
            FailureKind::UpstreamUnavailable => {
                api_internal_message("group memberships unavailable")
            }
            // The message names the caller and org, both taken from a verified assertion.
            FailureKind::NoScope => api_not_found(&err.to_string()),
        }
    }
}
