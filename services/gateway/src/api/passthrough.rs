//! Identity passthrough API handlers.
//!
//! # Security considerations
//! - Responses never include the raw bearer token, only the header names that
//!   downstream calls would carry.
//! - The status endpoint is unauthenticated and read-only; it exposes policy
//!   role names but no identities.
use crate::api::authenticate;
use crate::api::error::ApiError;
use crate::api::types::PassthroughContextResponse;
use crate::app::AppState;
use agentgate_authz::PassthroughStatus;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

/// Build the caller's passthrough context as downstream calls would see it.
pub(crate) async fn passthrough_context(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PassthroughContextResponse>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    let context = state.passthrough.build(&caller.token, &caller.identity);
    Ok(Json(PassthroughContextResponse {
        context: context.view(),
    }))
}

pub(crate) async fn passthrough_status(State(state): State<AppState>) -> Json<PassthroughStatus> {
    Json(PassthroughStatus::collect(
        &state.policy,
        state.passthrough.enabled(),
        state.authenticator.verifies_signatures(),
    ))
}
