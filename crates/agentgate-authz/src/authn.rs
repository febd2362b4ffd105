//! Bearer token authentication pipeline.
//!
//! # Purpose
//! Composes claim extraction, optional signature verification and identity
//! resolution behind a single [`Authenticator::authenticate`] call.
//!
//! # Key invariants
//! - Every failure is an [`AuthError`] and maps to an authentication failure.
//! - Issuer and expiry are checked before any signing key is looked up, so a
//!   foreign or expired token never causes a JWKS fetch.
//! - Failures are counted by kind in `agentgate_auth_failures_total`.
use crate::claims::{ClaimSet, ClaimsExtractor};
use crate::errors::{AuthError, AuthResult, TokenError};
use crate::identity::{Identity, IdentityResolver};
use crate::verify::SignatureVerifier;

/// Result of a successful authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub token: String,
    pub claims: ClaimSet,
    pub identity: Identity,
}

/// Per-request bearer token authentication.
///
/// # What it does
/// Turns a raw bearer token into an [`AuthenticatedCaller`]. Claims are checked
/// against the tenant issuers and expiry before the identity is resolved
/// against the live policy. With a [`SignatureVerifier`] installed, the
/// signature is verified in between.
///
/// # Invariants
/// - Claim checks run first; signature verification only sees tokens that
///   already passed them.
/// - Cloning is cheap and clones share the verifier's key cache.
#[derive(Clone)]
pub struct Authenticator {
    extractor: ClaimsExtractor,
    verifier: Option<SignatureVerifier>,
    resolver: IdentityResolver,
}

impl Authenticator {
    pub fn new(extractor: ClaimsExtractor, resolver: IdentityResolver) -> Self {
        Self {
            extractor,
            verifier: None,
            resolver,
        }
    }

    /// Require a valid RS256 signature on every token.
    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn verifies_signatures(&self) -> bool {
        self.verifier.is_some()
    }

    pub fn extractor(&self) -> &ClaimsExtractor {
        &self.extractor
    }

    /// Authenticate one bearer token, counting and logging failures by kind.
    pub async fn authenticate(&self, token: &str) -> AuthResult<AuthenticatedCaller> {
        match self.authenticate_inner(token).await {
            Ok(caller) => Ok(caller),
            Err(err) => {
                metrics::counter!("agentgate_auth_failures_total", "kind" => err.kind())
                    .increment(1);
                tracing::warn!(kind = err.kind(), error = %err, "authentication failed");
                Err(err)
            }
        }
    }

    async fn authenticate_inner(&self, token: &str) -> AuthResult<AuthenticatedCaller> {
        // Step 1: Structure, issuer and expiry. No keys are needed.
        let claims = self.extractor.extract(token)?;

        // Step 2: Signature, when enabled.
        if let Some(verifier) = &self.verifier {
            verifier.verify(token).await?;
        }

        // Step 3: Identity and roles.
        let identity = self.resolver.resolve(&claims).await?;
        tracing::debug!(
            subject = %identity.subject_id,
            roles = ?identity.roles,
            "authenticated caller"
        );
        Ok(AuthenticatedCaller {
            token: token.to_string(),
            claims,
            identity,
        })
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: &str) -> Result<&str, AuthError> {
    let header = header.trim();
    let (scheme, token) = header.split_once(' ').ok_or_else(missing_bearer)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(missing_bearer());
    }
    Ok(token)
}

fn missing_bearer() -> AuthError {
    TokenError::Malformed("expected a bearer token".to_string()).into()
}
