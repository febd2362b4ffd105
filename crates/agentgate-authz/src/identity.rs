//! Caller identity resolution.
//!
//! # Purpose
//! Turns a [`ClaimSet`] into the canonical [`Identity`] used for access checks
//! and passthrough, consulting the external profile store on the way.
//!
//! # Key invariants
//! - `subject_id` is `oid`, else `sub`; neither present is an error.
//! - The resolved role set is never empty and contains only roles known to the
//!   policy snapshot it was resolved against.
//! - Stored profile `email`/`name` win over token values.
use crate::claims::ClaimSet;
use crate::errors::IdentityError;
use crate::policy::{Policy, PolicyStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Email used when the token carries no email-like claim.
pub const UNKNOWN_EMAIL: &str = "unknown@example.com";
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Canonical caller representation for one request.
///
/// # What it does
/// Carries the stable subject id, the resolved contact fields and the roles
/// the live policy recognizes for this caller.
///
/// # Invariants
/// - `roles` only names roles defined by the policy the identity was
///   resolved against.
/// - Built per request; never persisted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub display_name: String,
    /// Ordered, duplicate-free, never empty.
    pub roles: Vec<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|candidate| candidate == role)
    }
}

/// Profile record held by the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub subject_id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// Idempotent get-or-create keyed by subject id.
///
/// # Why it exists
/// Profile persistence belongs to an external service. The resolver only
/// depends on this seam, so tests and deployments can swap backends.
///
/// # Invariants
/// - Repeated calls for one subject return the same `created_at`.
/// - Implementations must not block the calling task.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_or_create(
        &self,
        subject_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<UserProfile, IdentityError>;
}

/// Synchronous profile backend, e.g. a table-storage SDK client.
pub trait BlockingProfileBackend: Send + Sync + 'static {
    fn get_or_create(
        &self,
        subject_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<UserProfile, IdentityError>;
}

/// Runs a [`BlockingProfileBackend`] on the blocking pool so request tasks
/// keep making progress while the store call is in flight.
pub struct BlockingProfileStore<B> {
    backend: Arc<B>,
}

impl<B> BlockingProfileStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

#[async_trait]
impl<B: BlockingProfileBackend> ProfileStore for BlockingProfileStore<B> {
    async fn get_or_create(
        &self,
        subject_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<UserProfile, IdentityError> {
        let backend = self.backend.clone();
        let (subject_id, email, display_name) = (
            subject_id.to_string(),
            email.to_string(),
            display_name.to_string(),
        );
        tokio::task::spawn_blocking(move || {
            backend.get_or_create(&subject_id, &email, &display_name)
        })
        .await
        .map_err(|err| IdentityError::ProfileStoreUnavailable(err.to_string()))?
    }
}

/// Process-local profile store.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<String, UserProfile>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject_id: &str) -> Option<UserProfile> {
        self.profiles.get(subject_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_or_create(
        &self,
        subject_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<UserProfile, IdentityError> {
        let now = Utc::now();
        let mut entry = self
            .profiles
            .entry(subject_id.to_string())
            .or_insert_with(|| UserProfile {
                subject_id: subject_id.to_string(),
                email: email.to_string(),
                name: display_name.to_string(),
                created_at: now,
                last_login: now,
            });
        entry.last_login = now;
        if entry.email.is_empty() {
            entry.email = email.to_string();
        }
        if entry.name.is_empty() {
            entry.name = display_name.to_string();
        }
        Ok(entry.clone())
    }
}

/// Email from the token: `email`, `preferred_username`, `upn`, then sentinel.
pub fn token_email(claims: &ClaimSet) -> String {
    [&claims.email, &claims.preferred_username, &claims.upn]
        .into_iter()
        .find_map(|value| value.as_deref().filter(|value| !value.is_empty()))
        .unwrap_or(UNKNOWN_EMAIL)
        .to_string()
}

/// Display name from the token: `name`, else the email local part, else `User`.
pub fn token_display_name(claims: &ClaimSet, email: &str) -> String {
    if let Some(name) = claims.name.as_deref().filter(|name| !name.is_empty()) {
        return name.to_string();
    }
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => FALLBACK_DISPLAY_NAME.to_string(),
    }
}

/// Roles granted by the token, restricted to those `policy` knows about.
///
/// Falls back to exactly `{policy.default_role}` when nothing usable remains.
pub fn resolve_roles(claims: &ClaimSet, policy: &Policy) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();
    for role in claims.roles.iter().flatten() {
        if !policy.has_role(role) {
            tracing::warn!(role = %role, subject = ?claims.subject(), "ignoring unknown role");
            continue;
        }
        if !roles.contains(role) {
            roles.push(role.clone());
        }
    }
    if roles.is_empty() {
        tracing::debug!(
            default_role = %policy.default_role,
            subject = ?claims.subject(),
            "no usable roles in token, assigning default"
        );
        roles.push(policy.default_role.clone());
    }
    roles
}

/// Builds [`Identity`] values from validated claims.
///
/// # What it does
/// Derives the caller's subject and contact fields from the claims and records
/// them in the [`ProfileStore`]. Roles are resolved against the live policy.
///
/// # Invariants
/// - Stored non-empty profile values take precedence over token values.
/// - The only error paths are a missing subject and an unreachable store.
#[derive(Clone)]
pub struct IdentityResolver {
    policy: PolicyStore,
    profiles: Arc<dyn ProfileStore>,
}

impl IdentityResolver {
    pub fn new(policy: PolicyStore, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { policy, profiles }
    }

    /// Resolve one request's identity. Awaits the profile store once.
    pub async fn resolve(&self, claims: &ClaimSet) -> Result<Identity, IdentityError> {
        // Step 1: Stable subject id.
        let subject_id = claims
            .subject()
            .ok_or(IdentityError::MissingSubject)?
            .to_string();

        // Step 2: Token-derived profile fields.
        let email = token_email(claims);
        let display_name = token_display_name(claims, &email);

        // Step 3: Get-or-create the stored profile; its values are more durable.
        let profile = self
            .profiles
            .get_or_create(&subject_id, &email, &display_name)
            .await?;

        // Step 4: Roles against a single policy snapshot.
        let roles = resolve_roles(claims, &self.policy.current());

        Ok(Identity {
            subject_id,
            email: prefer_stored(profile.email, email),
            display_name: prefer_stored(profile.name, display_name),
            roles,
        })
    }
}

fn prefer_stored(stored: String, token: String) -> String {
    if stored.is_empty() { token } else { stored }
}
