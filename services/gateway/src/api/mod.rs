//! Gateway HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and the shared bearer-token authentication
//! step every protected handler runs first.
pub mod admin;
pub mod agents;
pub mod auth;
pub mod error;
pub mod passthrough;
pub mod system;
pub mod types;

use crate::api::error::{ApiError, api_auth_error, api_unauthorized};
use crate::app::AppState;
use agentgate_authz::{AuthenticatedCaller, extract_bearer};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedCaller, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| api_unauthorized("missing bearer token"))?;
    let token = extract_bearer(header).map_err(|err| api_auth_error(&err))?;
    state
        .authenticator
        .authenticate(token)
        .await
        .map_err(|err| api_auth_error(&err))
}
