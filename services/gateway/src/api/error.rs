//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction to keep error shapes uniform
//! across gateway endpoints.
//!
//! # Key invariants and assumptions
//! - Error responses include a stable `code` and a human-readable `message`.
//! - Every authentication failure is a 401, whatever stage rejected it.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
//! - Token error messages never echo the rejected token or issuer.
use crate::api::types::ErrorResponse;
use agentgate_authz::{AuthError, CatalogError, ConfigError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
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

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    // Authentication failed or missing.
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    // Authenticated, but the policy does not allow it.
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// 401 carrying the caller-safe message of an authentication failure.
pub fn api_auth_error(err: &AuthError) -> ApiError {
    api_unauthorized(&err.to_string())
}

/// 503 for an unreachable agent catalog.
pub fn api_catalog_unavailable(err: &CatalogError) -> ApiError {
    tracing::error!(error = %err, "agent catalog unavailable");
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "catalog_unavailable",
        "agent catalog unavailable",
    )
}

/// 500 for a rejected policy reload. Operators need the parse detail.
pub fn api_policy_reload_failed(err: &ConfigError) -> ApiError {
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "policy_reload_failed",
        &err.to_string(),
    )
}
