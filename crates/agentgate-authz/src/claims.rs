//! Bearer token claim extraction.
//!
//! # Purpose
//! Decodes the claims segment of an Entra ID style JWT and applies the issuer
//! and expiry checks that must hold before any identity is derived.
//!
//! # Key invariants
//! - No signature verification happens here; see [`crate::SignatureVerifier`]
//!   for the opt-in check.
//! - Expiry is evaluated before issuer so an expired token always reports
//!   [`TokenError::Expired`].
//! - The issuer must start with one of three tenant-scoped templates.
//! - Expiry uses whole seconds and no leeway.
use crate::errors::TokenError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

/// Claims decoded from a bearer token. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClaimSet {
    pub oid: Option<String>,
    pub sub: Option<String>,
    pub iss: Option<String>,
    pub exp: Option<i64>,
    pub email: Option<String>,
    pub preferred_username: Option<String>,
    pub upn: Option<String>,
    pub name: Option<String>,
    /// `None` when the token has no `roles` claim at all.
    pub roles: Option<Vec<String>>,
    /// Every other claim, untouched.
    pub extra: Map<String, Value>,
}

const KNOWN_CLAIMS: [&str; 9] = [
    "oid",
    "sub",
    "iss",
    "exp",
    "email",
    "preferred_username",
    "upn",
    "name",
    "roles",
];

impl ClaimSet {
    /// Build a claim set from a decoded JSON payload.
    pub fn from_value(value: Value) -> Result<Self, TokenError> {
        let Value::Object(mut map) = value else {
            return Err(TokenError::Invalid(
                "claims payload is not a JSON object".to_string(),
            ));
        };

        let claims = ClaimSet {
            oid: string_claim(&map, "oid")?,
            sub: string_claim(&map, "sub")?,
            iss: string_claim(&map, "iss")?,
            exp: exp_claim(&map)?,
            email: string_claim(&map, "email")?,
            preferred_username: string_claim(&map, "preferred_username")?,
            upn: string_claim(&map, "upn")?,
            name: string_claim(&map, "name")?,
            roles: roles_claim(&map),
            extra: Map::new(),
        };
        for key in KNOWN_CLAIMS {
            map.remove(key);
        }
        Ok(ClaimSet { extra: map, ..claims })
    }

    /// Stable subject identifier: `oid` first, then `sub`.
    pub fn subject(&self) -> Option<&str> {
        non_empty(self.oid.as_deref()).or_else(|| non_empty(self.sub.as_deref()))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Issuer prefixes accepted for a tenant, in evaluation order.
pub fn accepted_issuers(tenant_id: &str) -> Vec<String> {
    vec![
        format!("https://login.microsoftonline.com/{tenant_id}/v2.0"),
        format!("https://sts.windows.net/{tenant_id}/"),
        format!("https://login.microsoftonline.com/{tenant_id}/"),
    ]
}

/// Parses bearer tokens for a single configured tenant.
#[derive(Debug, Clone)]
pub struct ClaimsExtractor {
    tenant_id: String,
    accepted_issuers: Vec<String>,
}

impl ClaimsExtractor {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        let tenant_id = tenant_id.into();
        let accepted_issuers = accepted_issuers(&tenant_id);
        Self {
            tenant_id,
            accepted_issuers,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn accepted_issuers(&self) -> &[String] {
        &self.accepted_issuers
    }

    /// Decode and check a token against the current wall clock.
    pub fn extract(&self, token: &str) -> Result<ClaimSet, TokenError> {
        self.extract_at(token, Utc::now().timestamp())
    }

    /// Decode and check a token as of `now` (epoch seconds).
    pub fn extract_at(&self, token: &str, now: i64) -> Result<ClaimSet, TokenError> {
        // Step 1: Structural decode of header and payload.
        let payload = decode_payload(token)?;

        // Step 2: Expiry before anything else about the claims.
        if let Value::Object(map) = &payload
            && let Some(exp) = exp_claim(map)?
            && exp < now
        {
            return Err(TokenError::Expired);
        }

        // Step 3: Typed claims, then the issuer allowlist.
        let claims = ClaimSet::from_value(payload)?;
        let issuer = claims.iss.as_deref().unwrap_or_default();
        if !self.issuer_allowed(issuer) {
            tracing::warn!(issuer, tenant_id = %self.tenant_id, "rejected token issuer");
            return Err(TokenError::InvalidIssuer(issuer.to_string()));
        }
        Ok(claims)
    }

    fn issuer_allowed(&self, issuer: &str) -> bool {
        !issuer.is_empty()
            && self
                .accepted_issuers
                .iter()
                .any(|accepted| issuer.starts_with(accepted.as_str()))
    }
}

fn decode_payload(token: &str) -> Result<Value, TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let header = decode_segment(segments[0])
        .map_err(|_| TokenError::Malformed("header is not base64url".to_string()))?;
    let header: Value = serde_json::from_slice(&header)
        .map_err(|_| TokenError::Malformed("header is not JSON".to_string()))?;
    if !header.is_object() {
        return Err(TokenError::Malformed("header is not a JSON object".to_string()));
    }

    let payload = decode_segment(segments[1])
        .map_err(|_| TokenError::Malformed("payload is not base64url".to_string()))?;
    serde_json::from_slice(&payload)
        .map_err(|err| TokenError::Invalid(format!("payload is not JSON: {err}")))
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    // Some issuers pad their segments; the JWT grammar does not.
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))
}

fn string_claim(map: &Map<String, Value>, name: &str) -> Result<Option<String>, TokenError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(TokenError::Invalid(format!("claim `{name}` must be a string"))),
    }
}

fn exp_claim(map: &Map<String, Value>) -> Result<Option<i64>, TokenError> {
    match map.get("exp") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.floor() as i64))
            .map(Some)
            .ok_or_else(|| TokenError::Invalid("claim `exp` is out of range".to_string())),
        Some(_) => Err(TokenError::Invalid("claim `exp` must be numeric".to_string())),
    }
}

fn roles_claim(map: &Map<String, Value>) -> Option<Vec<String>> {
    // Roles may be a single string or an array; non-string entries are ignored.
    match map.get("roles")? {
        Value::Array(values) => Some(
            values
                .iter()
                .filter_map(|item| item.as_str().map(|val| val.to_string()))
                .collect(),
        ),
        Value::String(value) => Some(vec![value.clone()]),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}
