//! Request/response bodies for the gateway HTTP API.
use agentgate_authz::{AgentDescriptor, Identity, PassthroughView};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub identity: Identity,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentListResponse {
    pub agents: Vec<AgentDescriptor>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentDetailResponse {
    pub agent: AgentDescriptor,
    /// Rule that granted access, e.g. `pattern:chat`.
    pub rule: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassthroughContextResponse {
    #[serde(flatten)]
    pub context: PassthroughView,
}
