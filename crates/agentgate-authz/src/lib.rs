//! Identity, agent RBAC and identity passthrough primitives for agentgate.
//!
//! # Purpose
//! Turns a bearer token into a caller [`Identity`], decides which agents that
//! caller may use, and packages the identity for downstream calls.
//!
//! # How it fits
//! The gateway service wires these pieces into its HTTP surface:
//! [`Authenticator`] runs per request, [`AccessControlEngine`] filters the
//! [`AgentCatalog`], and [`PassthroughContextBuilder`] renders the headers
//! forwarded to agents and search.
//!
//! # Key invariants
//! - Token claims are parsed without signature verification unless a
//!   [`SignatureVerifier`] is installed.
//! - A resolved identity always carries at least one role known to the policy.
//! - Policy snapshots are immutable; reload swaps them atomically.
//!
//! # Examples
//! ```rust
//! use agentgate_authz::{AgentDescriptor, Policy, evaluate};
//!
//! let policy = Policy::builtin_default();
//! let decision = evaluate(&policy, &["BasicUser"], &AgentDescriptor::new("General Chat"));
//! assert!(decision.allowed);
//! assert_eq!(decision.rule_name(), "pattern:general");
//! ```
//!
//! # Common pitfalls
//! - Agent patterns are substrings: `data` also matches `Metadata Cleaner`.

mod access;
mod authn;
mod catalog;
mod claims;
mod errors;
mod identity;
mod passthrough;
mod policy;
mod status;
mod verify;

pub use access::{
    AccessControlEngine, AccessDecision, AgentDescriptor, AgentMetadata, MatchedRule, evaluate,
    pattern_matches,
};
pub use authn::{AuthenticatedCaller, Authenticator, extract_bearer};
pub use catalog::{AgentCatalog, StaticCatalog};
pub use claims::{ClaimSet, ClaimsExtractor, accepted_issuers};
pub use errors::{
    AuthError, AuthResult, CatalogError, ConfigError, IdentityError, SignatureError, TokenError,
};
pub use identity::{
    BlockingProfileBackend, BlockingProfileStore, FALLBACK_DISPLAY_NAME, Identity,
    IdentityResolver, InMemoryProfileStore, ProfileStore, UNKNOWN_EMAIL, UserProfile,
    resolve_roles, token_display_name, token_email,
};
pub use passthrough::{
    AUTHORIZATION_HEADER, DownstreamCall, PASSTHROUGH_HEADERS, PassthroughContext,
    PassthroughContextBuilder, PassthroughView, USER_EMAIL_HEADER, USER_ID_HEADER, UserIdentity,
};
pub use policy::{
    AgentOverride, BUILTIN_ADMIN_ROLE, BUILTIN_DEFAULT_ROLE, Policy, PolicySettings, PolicySource,
    PolicyStats, PolicyStore, RolePermission,
};
pub use status::PassthroughStatus;
pub use verify::{DEFAULT_JWKS_TTL, SignatureVerifier, tenant_jwks_url};
