//! Read-only diagnostic summary of the passthrough and policy state.
use crate::passthrough::PASSTHROUGH_HEADERS;
use crate::policy::{PolicySettings, PolicyStore};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassthroughStatus {
    pub passthrough_enabled: bool,
    pub signature_verification: bool,
    pub header_names: Vec<&'static str>,
    pub policy_version: String,
    pub roles: Vec<String>,
    pub default_role: String,
    pub agent_override_count: usize,
    pub settings: PolicySettings,
    pub last_loaded: DateTime<Utc>,
}

impl PassthroughStatus {
    pub fn collect(
        policy: &PolicyStore,
        passthrough_enabled: bool,
        signature_verification: bool,
    ) -> Self {
        let stats = policy.stats();
        let header_names = if passthrough_enabled {
            PASSTHROUGH_HEADERS.to_vec()
        } else {
            Vec::new()
        };
        Self {
            passthrough_enabled,
            signature_verification,
            header_names,
            policy_version: stats.config_version,
            roles: stats.roles,
            default_role: stats.default_role,
            agent_override_count: stats.total_agent_overrides,
            settings: stats.settings,
            last_loaded: stats.last_loaded,
        }
    }
}
