//! Identity passthrough context for downstream agent and search calls.
//!
//! # Purpose
//! Packages the caller's bearer token and resolved identity so every
//! downstream call carries the same identity headers.
//!
//! # Key invariants
//! - Completion, streaming and search calls render an identical header set.
//! - When passthrough is disabled no identity headers are rendered.
//! - The raw token never appears in `Debug` output or in [`PassthroughView`].
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// Header names rendered when passthrough is enabled, in rendering order.
pub const PASSTHROUGH_HEADERS: [&str; 3] = [AUTHORIZATION_HEADER, USER_ID_HEADER, USER_EMAIL_HEADER];

const UNKNOWN_VALUE: &str = "unknown";

/// Kinds of downstream call that carry the passthrough headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownstreamCall {
    Completion,
    Stream,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    pub subject_id: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PassthroughContext {
    pub oauth_token: String,
    pub user_identity: UserIdentity,
    pub passthrough_enabled: bool,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Debug for PassthroughContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassthroughContext")
            .field("oauth_token", &"<redacted>")
            .field("user_identity", &self.user_identity)
            .field("passthrough_enabled", &self.passthrough_enabled)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl PassthroughContext {
    /// Headers to attach to a downstream call.
    ///
    /// Empty identity values are sent as `unknown`.
    pub fn outbound_headers(&self) -> Vec<(&'static str, String)> {
        if !self.passthrough_enabled {
            return Vec::new();
        }
        vec![
            (AUTHORIZATION_HEADER, format!("Bearer {}", self.oauth_token)),
            (USER_ID_HEADER, or_unknown(&self.user_identity.subject_id)),
            (USER_EMAIL_HEADER, or_unknown(&self.user_identity.email)),
        ]
    }

    pub fn headers_for(&self, call: DownstreamCall) -> Vec<(&'static str, String)> {
        let headers = self.outbound_headers();
        tracing::debug!(
            call = ?call,
            subject = %self.user_identity.subject_id,
            headers = headers.len(),
            "rendering passthrough headers"
        );
        headers
    }

    /// Serializable view without the raw token.
    pub fn view(&self) -> PassthroughView {
        PassthroughView {
            user_identity: self.user_identity.clone(),
            passthrough_enabled: self.passthrough_enabled,
            timestamp: self.timestamp,
            header_names: self
                .outbound_headers()
                .into_iter()
                .map(|(name, _)| name)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassthroughView {
    pub user_identity: UserIdentity,
    pub passthrough_enabled: bool,
    pub timestamp: DateTime<Utc>,
    pub header_names: Vec<&'static str>,
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN_VALUE.to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PassthroughContextBuilder {
    enabled: bool,
}

impl PassthroughContextBuilder {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn build(&self, token: &str, identity: &Identity) -> PassthroughContext {
        self.build_at(token, identity, Utc::now())
    }

    pub fn build_at(
        &self,
        token: &str,
        identity: &Identity,
        timestamp: DateTime<Utc>,
    ) -> PassthroughContext {
        PassthroughContext {
            oauth_token: token.to_string(),
            user_identity: UserIdentity {
                subject_id: identity.subject_id.clone(),
                email: identity.email.clone(),
                display_name: identity.display_name.clone(),
            },
            passthrough_enabled: self.enabled,
            timestamp,
        }
    }
}
