//! Administrative policy endpoints.
//!
//! # Key invariants and assumptions
//! - Only callers holding an `allow_all` role in the live policy may reload.
//! - A failed reload leaves the previous policy serving traffic.
use crate::api::authenticate;
use crate::api::error::{ApiError, api_forbidden, api_internal_message, api_policy_reload_failed};
use crate::app::AppState;
use agentgate_authz::PolicyStats;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

/// Re-read the policy document and swap it in if valid.
pub(crate) async fn reload_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PolicyStats>, ApiError> {
    // Step 1: Only unrestricted roles may reload.
    let caller = authenticate(&state, &headers).await?;
    if !state.policy.current().grants_all(&caller.identity.roles) {
        return Err(api_forbidden("policy reload requires an unrestricted role"));
    }

    // Step 2: Reload reads the file synchronously; keep it off the reactor.
    let store = state.policy.clone();
    let result = tokio::task::spawn_blocking(move || store.reload())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "policy reload task failed");
            api_internal_message("policy reload failed")
        })?;

    match result {
        Ok(_) => {
            tracing::info!(subject = %caller.identity.subject_id, "policy reloaded via api");
            Ok(Json(state.policy.stats()))
        }
        Err(err) => Err(api_policy_reload_failed(&err)),
    }
}
