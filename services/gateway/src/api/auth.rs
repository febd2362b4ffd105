//! Caller identity endpoint.
use crate::api::authenticate;
use crate::api::error::ApiError;
use crate::api::types::MeResponse;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

/// Return the resolved identity of the caller.
pub(crate) async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    Ok(Json(MeResponse {
        identity: caller.identity,
    }))
}
