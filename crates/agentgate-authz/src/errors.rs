use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning a bearer token into a claim set.
///
/// Every variant renders a message that is safe to hand back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("invalid token issuer")]
    InvalidIssuer(String),
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

impl TokenError {
    /// Stable label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed(_) => "malformed",
            TokenError::InvalidIssuer(_) => "invalid_issuer",
            TokenError::Expired => "expired",
            TokenError::Invalid(_) => "invalid",
        }
    }
}

/// Failures while resolving a claim set into an [`crate::Identity`].
///
/// # What it does
/// Reports claim sets that carry no subject and profile stores that cannot
/// be reached.
///
/// # Invariants
/// - Role resolution never produces this error; unknown roles degrade to the
///   policy default instead.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("token carries neither oid nor sub")]
    MissingSubject,
    #[error("profile store unavailable: {0}")]
    ProfileStoreUnavailable(String),
}

impl IdentityError {
    /// Stable label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityError::MissingSubject => "missing_subject",
            IdentityError::ProfileStoreUnavailable(_) => "profile_store_unavailable",
        }
    }
}

/// Failures while reading or validating a policy document.
///
/// # What it does
/// Describes why a policy source could not produce a [`crate::Policy`].
///
/// # Why it exists
/// Initial load absorbs these and degrades to the built-in policy, while
/// reload returns them so operators learn why the new document was refused.
///
/// # Invariants
/// - `ParseFailure` covers both JSON syntax and semantic validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("policy document not found: {0}")]
    NotFound(PathBuf),
    #[error("policy document unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("policy document invalid: {0}")]
    ParseFailure(String),
}

/// The agent catalog collaborator could not list agents.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("agent catalog unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the opt-in RS256 signature check.
///
/// Only produced when a [`crate::SignatureVerifier`] is installed, and only for
/// tokens that already passed the issuer and expiry checks.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("missing key id")]
    MissingKeyId,
    #[error("invalid jwk: {0}")]
    InvalidJwk(String),
    #[error("jwks key not found")]
    JwksKeyNotFound,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Boundary error for the whole authentication pipeline.
///
/// All variants map to an authentication failure (HTTP 401).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("signature verification failed: {0}")]
    Signature(#[from] SignatureError),
}

impl AuthError {
    /// Label of the underlying failure, e.g. `expired` or `signature`.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Token(err) => err.kind(),
            AuthError::Identity(err) => err.kind(),
            AuthError::Signature(_) => "signature",
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
