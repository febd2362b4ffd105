//! Agent catalog API handlers.
//!
//! # Key invariants and assumptions
//! - Callers only ever see agents their roles allow, in catalog order.
//! - An unknown agent is a 404 even for callers who could not use it.
use crate::api::authenticate;
use crate::api::error::{
    ApiError, api_catalog_unavailable, api_forbidden, api_not_found, api_validation_error,
};
use crate::api::types::{AgentDetailResponse, AgentListResponse};
use crate::app::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;

/// List the agents visible to the caller.
pub(crate) async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AgentListResponse>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    let agents = state
        .catalog
        .list_agents()
        .await
        .map_err(|err| api_catalog_unavailable(&err))?;
    let agents = state.access.filter(&caller.identity.roles, &agents);
    Ok(Json(AgentListResponse {
        count: agents.len(),
        agents,
    }))
}

/// Fetch one agent by display name, if the caller may use it.
pub(crate) async fn get_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AgentDetailResponse>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    if name.trim().is_empty() {
        return Err(api_validation_error("agent name must not be empty"));
    }
    let agents = state
        .catalog
        .list_agents()
        .await
        .map_err(|err| api_catalog_unavailable(&err))?;
    let agent = agents
        .into_iter()
        .find(|agent| agent.name == name)
        .ok_or_else(|| api_not_found("agent not found"))?;

    let decision = state.access.can_access(&caller.identity.roles, &agent);
    if !decision.allowed {
        tracing::info!(
            subject = %caller.identity.subject_id,
            agent = %agent.name,
            "agent access denied"
        );
        return Err(api_forbidden("access to agent denied"));
    }
    Ok(Json(AgentDetailResponse {
        rule: decision.rule_name(),
        role: decision.role,
        agent,
    }))
}
