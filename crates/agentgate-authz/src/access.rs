//! Role-based agent access decisions.
//!
//! # Purpose
//! Decides whether a role set may use an agent, and filters catalogs down to
//! the agents a caller may see.
//!
//! # Evaluation order
//! For each role in caller order, first match wins:
//! 1. `allow_all` on the role.
//! 2. Agent metadata `required_roles`; when the agent carries no metadata the
//!    policy's `agent_overrides` entry for its name is used instead.
//! 3. Agent name patterns (`*` or substring).
//!
//! Roles unknown to the policy never match. A decision for one request is
//! taken against exactly one policy snapshot.
use crate::policy::{Policy, PolicyStore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata attached to an agent by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    #[serde(default)]
    pub required_roles: Vec<String>,
}

/// A downstream agent as described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AgentMetadata>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_required_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata = Some(AgentMetadata {
            required_roles: roles.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// Which rule produced a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedRule {
    AllowAll,
    MetadataOverride,
    Pattern(String),
    NoMatch,
}

impl fmt::Display for MatchedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedRule::AllowAll => f.write_str("allow_all"),
            MatchedRule::MetadataOverride => f.write_str("metadata_override"),
            MatchedRule::Pattern(pattern) => write!(f, "pattern:{pattern}"),
            MatchedRule::NoMatch => f.write_str("no_match"),
        }
    }
}

impl Serialize for MatchedRule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub rule: MatchedRule,
    /// Role that produced an allow; `None` on deny.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl AccessDecision {
    fn allow(rule: MatchedRule, role: &str) -> Self {
        Self {
            allowed: true,
            rule,
            role: Some(role.to_string()),
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            rule: MatchedRule::NoMatch,
            role: None,
        }
    }

    pub fn rule_name(&self) -> String {
        self.rule.to_string()
    }
}

/// Substring match of `pattern` within `agent_name`; `*` matches everything.
pub fn pattern_matches(pattern: &str, agent_name: &str, case_sensitive: bool) -> bool {
    if pattern == "*" {
        return true;
    }
    if case_sensitive {
        agent_name.contains(pattern)
    } else {
        agent_name.to_lowercase().contains(&pattern.to_lowercase())
    }
}

/// Evaluate one role set against one agent under `policy`. Pure.
pub fn evaluate<S: AsRef<str>>(
    policy: &Policy,
    roles: &[S],
    agent: &AgentDescriptor,
) -> AccessDecision {
    let settings = policy.settings;
    let required_roles = if settings.agent_metadata_enabled {
        match &agent.metadata {
            Some(metadata) => Some(metadata.required_roles.as_slice()),
            None => policy
                .agent_override(&agent.name)
                .map(|entry| entry.required_roles.as_slice()),
        }
    } else {
        None
    };

    for role in roles {
        let role = role.as_ref();
        let Some(permission) = policy.role(role) else {
            continue;
        };

        if permission.allow_all {
            return AccessDecision::allow(MatchedRule::AllowAll, role);
        }

        if let Some(required) = required_roles
            && required.iter().any(|candidate| candidate == role)
        {
            return AccessDecision::allow(MatchedRule::MetadataOverride, role);
        }

        if settings.pattern_matching_enabled
            && let Some(pattern) = permission.agent_patterns.iter().find(|pattern| {
                pattern_matches(pattern, &agent.name, settings.case_sensitive_patterns)
            })
        {
            return AccessDecision::allow(MatchedRule::Pattern(pattern.clone()), role);
        }
    }

    AccessDecision::deny()
}

/// Access decisions against the live policy.
#[derive(Debug, Clone)]
pub struct AccessControlEngine {
    policy: PolicyStore,
}

impl AccessControlEngine {
    pub fn new(policy: PolicyStore) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    pub fn can_access<S: AsRef<str>>(
        &self,
        roles: &[S],
        agent: &AgentDescriptor,
    ) -> AccessDecision {
        let policy = self.policy.current();
        decide(&policy, roles, agent)
    }

    /// Agents the role set may use, in catalog order.
    pub fn filter<S: AsRef<str>>(
        &self,
        roles: &[S],
        agents: &[AgentDescriptor],
    ) -> Vec<AgentDescriptor> {
        let policy = self.policy.current();
        let visible: Vec<AgentDescriptor> = agents
            .iter()
            .filter(|agent| decide(&policy, roles, agent).allowed)
            .cloned()
            .collect();
        tracing::debug!(
            total = agents.len(),
            visible = visible.len(),
            "filtered agent catalog"
        );
        visible
    }
}

fn decide<S: AsRef<str>>(
    policy: &Policy,
    roles: &[S],
    agent: &AgentDescriptor,
) -> AccessDecision {
    let decision = evaluate(policy, roles, agent);
    metrics::counter!(
        "agentgate_access_decisions_total",
        "allowed" => if decision.allowed { "true" } else { "false" }
    )
    .increment(1);
    if policy.settings.log_access_attempts {
        let roles: Vec<&str> = roles.iter().map(|role| role.as_ref()).collect();
        tracing::debug!(
            agent = %agent.name,
            roles = ?roles,
            allowed = decision.allowed,
            rule = %decision.rule,
            "agent access decision"
        );
    }
    decision
}
