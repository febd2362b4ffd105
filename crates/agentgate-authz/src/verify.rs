//! Opt-in RS256 signature verification against the tenant JWKS.
//!
//! # Purpose
//! Claim extraction never checks signatures. Deployments that want that check
//! enable this verifier, which runs after claim extraction in the
//! authentication pipeline so unauthenticated garbage never reaches the key
//! endpoint.
//!
//! # Key invariants
//! - Only RS256 tokens with a `kid` header are accepted.
//! - Only the signature is checked here. Issuer and expiry stay with
//!   [`crate::ClaimsExtractor`] so both paths report the same errors.
//! - An unknown `kid` triggers exactly one JWKS refresh before failing.
//!
//! # Concurrency model
//! The JWKS cache is a `DashMap` keyed by URL with a per-entry expiry, shared
//! by clones of the verifier.
use crate::errors::SignatureError;
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(3600);

/// Signing-key endpoint for an Entra ID tenant.
pub fn tenant_jwks_url(tenant_id: &str) -> String {
    format!("https://login.microsoftonline.com/{tenant_id}/discovery/v2.0/keys")
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    client: reqwest::Client,
    jwks_url: String,
    jwks_cache: Arc<DashMap<String, CachedJwks>>,
    jwks_ttl: Duration,
}

impl SignatureVerifier {
    pub fn new(jwks_url: impl Into<String>, jwks_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_url: jwks_url.into(),
            jwks_cache: Arc::new(DashMap::new()),
            jwks_ttl,
        }
    }

    pub fn for_tenant(tenant_id: &str) -> Self {
        Self::new(tenant_jwks_url(tenant_id), DEFAULT_JWKS_TTL)
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Seed the cache, e.g. from a pinned key set.
    pub fn insert_jwks(&self, jwks: JwkSet) {
        self.jwks_cache.insert(
            self.jwks_url.clone(),
            CachedJwks {
                jwks,
                expires_at: Instant::now() + self.jwks_ttl,
            },
        );
    }

    /// Check the token signature. Claims are not interpreted.
    pub async fn verify(&self, token: &str) -> Result<(), SignatureError> {
        // Step 1: Pin the algorithm before touching keys.
        let header = decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(SignatureError::UnsupportedAlgorithm);
        }
        let kid = header.kid.as_deref().ok_or(SignatureError::MissingKeyId)?;

        // Step 2: Find the key, refreshing once on a miss to follow key rotation.
        let jwks = self.get_jwks().await?;
        let decoding_key = match find_jwk(&jwks, kid) {
            Some(key) => rsa_decoding_key(key)?,
            None => {
                tracing::debug!(kid = %kid, "signing key not cached, refreshing jwks");
                let refreshed = self.refresh_jwks().await?;
                let key = find_jwk(&refreshed, kid).ok_or(SignatureError::JwksKeyNotFound)?;
                rsa_decoding_key(key)?
            }
        };

        // Step 3: Signature only.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        decode::<Value>(token, &decoding_key, &validation)?;
        Ok(())
    }

    async fn get_jwks(&self) -> Result<JwkSet, SignatureError> {
        if let Some(entry) = self.jwks_cache.get(&self.jwks_url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks.clone());
        }
        self.refresh_jwks().await
    }

    async fn refresh_jwks(&self) -> Result<JwkSet, SignatureError> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::info!(url = %self.jwks_url, keys = jwks.keys.len(), "fetched jwks");
        self.insert_jwks(jwks.clone());
        Ok(jwks)
    }
}

fn find_jwk<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
}

fn rsa_decoding_key(jwk: &Jwk) -> Result<DecodingKey, SignatureError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Ok(DecodingKey::from_jwk(jwk)?),
        _ => Err(SignatureError::InvalidJwk("expected an RSA key".to_string())),
    }
}
