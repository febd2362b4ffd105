//! Agent access policy document and its hot-reloadable store.
//!
//! # Purpose
//! Parses the JSON policy document into a validated [`Policy`] and publishes it
//! through a [`PolicyStore`] handle shared by every request.
//!
//! # Key invariants
//! - `default_role` always names a role in `role_permissions`.
//! - A published snapshot is never mutated; reload swaps the whole `Arc`.
//! - [`PolicyStore::load`] never fails. It falls back to
//!   [`Policy::builtin_default`] and logs the degradation.
//! - [`PolicyStore::reload`] only swaps after a successful parse.
//!
//! # Concurrency model
//! Readers call [`PolicyStore::current`], a lock-free `ArcSwap` load. Reloads
//! are serialized by a mutex that is never held across an `.await`.
use crate::errors::ConfigError;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Unrestricted role of the built-in policy.
pub const BUILTIN_ADMIN_ROLE: &str = "Admin";
/// Default role of the built-in policy.
pub const BUILTIN_DEFAULT_ROLE: &str = "BasicUser";

/// What one role may reach.
///
/// `allow_all` short-circuits every other rule. Otherwise an agent is
/// reachable when its name contains one of `agent_patterns`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent_patterns: Vec<String>,
    #[serde(default)]
    pub allow_all: bool,
}

/// Roles that may use one specific agent regardless of patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOverride {
    #[serde(default)]
    pub required_roles: Vec<String>,
}

/// Evaluation switches. Missing fields default to `true, true, false, true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(rename = "enable_pattern_matching", default = "enabled")]
    pub pattern_matching_enabled: bool,
    #[serde(rename = "enable_agent_metadata", default = "enabled")]
    pub agent_metadata_enabled: bool,
    #[serde(default)]
    pub case_sensitive_patterns: bool,
    #[serde(default = "enabled")]
    pub log_access_attempts: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            pattern_matching_enabled: true,
            agent_metadata_enabled: true,
            case_sensitive_patterns: false,
            log_access_attempts: true,
        }
    }
}

fn enabled() -> bool {
    true
}

// Wire shape of the policy file.
#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(default = "unknown_version")]
    version: String,
    #[serde(default = "builtin_default_role")]
    default_role: String,
    #[serde(default)]
    role_permissions: BTreeMap<String, RolePermission>,
    #[serde(default)]
    agent_metadata: AgentMetadataSection,
    #[serde(default)]
    settings: PolicySettings,
}

#[derive(Debug, Default, Deserialize)]
struct AgentMetadataSection {
    #[serde(default)]
    agents: BTreeMap<String, AgentOverride>,
}

fn unknown_version() -> String {
    "unknown".to_string()
}

fn builtin_default_role() -> String {
    BUILTIN_DEFAULT_ROLE.to_string()
}

/// Validated, immutable access policy.
///
/// # What it does
/// Maps roles to the agents they may reach for one policy version, together
/// with per-agent overrides and evaluation settings.
///
/// # Invariants
/// - `default_role` is a key of `role_permissions`.
/// - No role carries an empty agent pattern.
/// - Never mutated after construction; reload installs a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub version: String,
    pub default_role: String,
    pub role_permissions: BTreeMap<String, RolePermission>,
    pub agent_overrides: BTreeMap<String, AgentOverride>,
    pub settings: PolicySettings,
}

impl Policy {
    /// Minimal policy used whenever no valid document is available.
    pub fn builtin_default() -> Self {
        let mut role_permissions = BTreeMap::new();
        role_permissions.insert(
            BUILTIN_ADMIN_ROLE.to_string(),
            RolePermission {
                description: "Full access".to_string(),
                agent_patterns: vec!["*".to_string()],
                allow_all: true,
            },
        );
        role_permissions.insert(
            BUILTIN_DEFAULT_ROLE.to_string(),
            RolePermission {
                description: "Basic access".to_string(),
                agent_patterns: vec![
                    "general".to_string(),
                    "chat".to_string(),
                    "assistant".to_string(),
                ],
                allow_all: false,
            },
        );
        Self {
            version: "builtin".to_string(),
            default_role: BUILTIN_DEFAULT_ROLE.to_string(),
            role_permissions,
            agent_overrides: BTreeMap::new(),
            settings: PolicySettings::default(),
        }
    }

    /// Parse and validate a policy document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let document: PolicyDocument =
            serde_json::from_str(raw).map_err(|err| ConfigError::ParseFailure(err.to_string()))?;
        Self::from_document(document)
    }

    fn from_document(document: PolicyDocument) -> Result<Self, ConfigError> {
        // Role names and patterns are kept byte-for-byte; matching is substring
        // based, so surrounding whitespace is significant.
        let mut role_permissions = BTreeMap::new();
        for (name, mut permission) in document.role_permissions {
            if name.is_empty() {
                return Err(ConfigError::ParseFailure("empty role name".to_string()));
            }
            // An empty pattern would be a substring of every agent name.
            permission.agent_patterns.retain(|pattern| {
                if pattern.is_empty() {
                    tracing::warn!(role = %name, "dropping empty agent pattern");
                }
                !pattern.is_empty()
            });
            role_permissions.insert(name, permission);
        }

        let default_role = document.default_role;
        if !role_permissions.contains_key(&default_role) {
            return Err(ConfigError::ParseFailure(format!(
                "default role `{default_role}` is not defined in role_permissions"
            )));
        }

        Ok(Self {
            version: document.version,
            default_role,
            role_permissions,
            agent_overrides: document.agent_metadata.agents,
            settings: document.settings,
        })
    }

    /// Permission entry for `name`, matched exactly.
    pub fn role(&self, name: &str) -> Option<&RolePermission> {
        self.role_permissions.get(name)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.role_permissions.contains_key(name)
    }

    /// Role names in sorted order.
    pub fn roles(&self) -> Vec<String> {
        self.role_permissions.keys().cloned().collect()
    }

    /// Config-supplied required roles for an agent, keyed by its display name.
    pub fn agent_override(&self, agent_name: &str) -> Option<&AgentOverride> {
        self.agent_overrides.get(agent_name)
    }

    /// True when any of `roles` is an `allow_all` role.
    pub fn grants_all<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles
            .iter()
            .filter_map(|role| self.role(role.as_ref()))
            .any(|permission| permission.allow_all)
    }
}

/// Where the policy document comes from.
#[derive(Debug, Clone)]
pub enum PolicySource {
    File(PathBuf),
    Inline(String),
}

impl PolicySource {
    fn read(&self) -> Result<Policy, ConfigError> {
        match self {
            PolicySource::File(path) => {
                let raw = std::fs::read_to_string(path).map_err(|err| {
                    if err.kind() == std::io::ErrorKind::NotFound {
                        ConfigError::NotFound(path.clone())
                    } else {
                        ConfigError::Unreadable {
                            path: path.clone(),
                            source: err,
                        }
                    }
                })?;
                Policy::from_json(&raw)
            }
            PolicySource::Inline(raw) => Policy::from_json(raw),
        }
    }

    fn describe(&self) -> String {
        match self {
            PolicySource::File(path) => path.display().to_string(),
            PolicySource::Inline(_) => "inline".to_string(),
        }
    }
}

#[derive(Debug)]
struct Installed {
    policy: Arc<Policy>,
    loaded_at: DateTime<Utc>,
}

impl Installed {
    fn now(policy: Policy) -> Self {
        Self {
            policy: Arc::new(policy),
            loaded_at: Utc::now(),
        }
    }
}

struct PolicyStoreInner {
    source: PolicySource,
    installed: ArcSwap<Installed>,
    reload_lock: Mutex<()>,
}

/// Cheaply cloneable handle to the live policy snapshot.
///
/// # What it does
/// Owns the policy source and the currently installed [`Policy`], and swaps
/// in a new snapshot when [`PolicyStore::reload`] succeeds.
///
/// # Why it exists
/// Request handlers need a consistent policy without locking, while
/// operators need to change it without a restart.
///
/// # Invariants
/// - [`PolicyStore::current`] is a lock-free pointer load.
/// - Reloads are serialized; readers holding an older snapshot keep it.
/// - A failed reload never changes the installed snapshot.
///
/// # Example
/// ```rust
/// use agentgate_authz::{PolicySource, PolicyStore};
///
/// let store = PolicyStore::load(PolicySource::Inline("not json".to_string()));
/// assert_eq!(store.current().version, "builtin");
/// assert!(store.reload().is_err());
/// assert_eq!(store.stats().default_role, "BasicUser");
/// ```
#[derive(Clone)]
pub struct PolicyStore {
    inner: Arc<PolicyStoreInner>,
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStore")
            .field("source", &self.inner.source.describe())
            .field("version", &self.current().version)
            .finish()
    }
}

impl PolicyStore {
    /// Load a policy from `source`, degrading to the built-in policy on error.
    pub fn load(source: PolicySource) -> Self {
        let policy = match source.read() {
            Ok(policy) => {
                tracing::info!(
                    source = %source.describe(),
                    version = %policy.version,
                    roles = policy.role_permissions.len(),
                    agent_overrides = policy.agent_overrides.len(),
                    "loaded access policy"
                );
                policy
            }
            Err(err) => {
                tracing::warn!(
                    source = %source.describe(),
                    error = %err,
                    "falling back to built-in access policy"
                );
                Policy::builtin_default()
            }
        };
        Self::with_source(source, policy)
    }

    /// Store serving a fixed policy; reload re-validates the same document.
    pub fn from_policy(policy: Policy) -> Self {
        let raw = serde_json::to_string(&PolicyDocumentRef::from(&policy)).unwrap_or_default();
        Self::with_source(PolicySource::Inline(raw), policy)
    }

    fn with_source(source: PolicySource, policy: Policy) -> Self {
        Self {
            inner: Arc::new(PolicyStoreInner {
                source,
                installed: ArcSwap::from_pointee(Installed::now(policy)),
                reload_lock: Mutex::new(()),
            }),
        }
    }

    /// Latest successfully loaded snapshot. Never blocks on I/O.
    pub fn current(&self) -> Arc<Policy> {
        self.inner.installed.load().policy.clone()
    }

    /// When the installed snapshot was loaded.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.inner.installed.load().loaded_at
    }

    /// Re-read the source and swap the snapshot if it parses.
    ///
    /// On failure the running policy is untouched and the error is returned.
    pub fn reload(&self) -> Result<Arc<Policy>, ConfigError> {
        let _guard = self.inner.reload_lock.lock();
        match self.inner.source.read() {
            Ok(policy) => {
                let installed = Installed::now(policy);
                let policy = installed.policy.clone();
                self.inner.installed.store(Arc::new(installed));
                metrics::counter!("agentgate_policy_reloads_total", "outcome" => "ok").increment(1);
                tracing::info!(version = %policy.version, "access policy reloaded");
                Ok(policy)
            }
            Err(err) => {
                metrics::counter!("agentgate_policy_reloads_total", "outcome" => "error")
                    .increment(1);
                tracing::error!(error = %err, "access policy reload failed, keeping previous");
                Err(err)
            }
        }
    }

    /// Summary of the installed snapshot, read in one atomic load.
    pub fn stats(&self) -> PolicyStats {
        let installed = self.inner.installed.load();
        PolicyStats::new(&installed.policy, installed.loaded_at)
    }
}

/// Read-only summary of the live policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyStats {
    pub config_version: String,
    pub last_loaded: DateTime<Utc>,
    pub total_roles: usize,
    pub total_agent_overrides: usize,
    pub roles: Vec<String>,
    pub default_role: String,
    pub settings: PolicySettings,
}

impl PolicyStats {
    fn new(policy: &Policy, loaded_at: DateTime<Utc>) -> Self {
        Self {
            config_version: policy.version.clone(),
            last_loaded: loaded_at,
            total_roles: policy.role_permissions.len(),
            total_agent_overrides: policy.agent_overrides.len(),
            roles: policy.roles(),
            default_role: policy.default_role.clone(),
            settings: policy.settings,
        }
    }
}

// Serialized back into the document shape so inline stores can reload.
#[derive(Serialize)]
struct PolicyDocumentRef<'a> {
    version: &'a str,
    default_role: &'a str,
    role_permissions: &'a BTreeMap<String, RolePermission>,
    agent_metadata: AgentMetadataRef<'a>,
    settings: PolicySettings,
}

#[derive(Serialize)]
struct AgentMetadataRef<'a> {
    agents: &'a BTreeMap<String, AgentOverride>,
}

impl<'a> From<&'a Policy> for PolicyDocumentRef<'a> {
    fn from(policy: &'a Policy) -> Self {
        Self {
            version: &policy.version,
            default_role: &policy.default_role,
            role_permissions: &policy.role_permissions,
            agent_metadata: AgentMetadataRef {
                agents: &policy.agent_overrides,
            },
            settings: policy.settings,
        }
    }
}
