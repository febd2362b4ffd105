#![allow(dead_code)]

use agentgate_authz::{
    AccessControlEngine, AgentCatalog, AgentDescriptor, Authenticator, ClaimsExtractor,
    IdentityResolver, InMemoryProfileStore, PassthroughContextBuilder, PolicySource, PolicyStore,
    StaticCatalog,
};
use axum::body::Body;
use axum::http::Request;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gateway::app::{AppState, build_router};
use serde_json::Value;
use std::sync::Arc;

pub const TENANT: &str = "tenant-1";

pub type TestApp = axum::routing::RouterIntoService<Body, ()>;

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Unsigned token for `TENANT` with the given extra claims.
pub fn token(claims: Value) -> String {
    let mut payload = serde_json::json!({
        "iss": format!("https://sts.windows.net/{TENANT}/"),
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    if let (Some(base), Value::Object(extra)) = (payload.as_object_mut(), claims) {
        base.extend(extra);
    }
    raw_token(&payload)
}

pub fn raw_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT","kid":"k1"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).expect("payload"));
    format!("{header}.{payload}.c2ln")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token)
}

pub fn post(uri: &str, token: Option<&str>) -> Request<Body> {
    request("POST", uri, token)
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn state_with(
    policy: PolicyStore,
    catalog: Arc<dyn AgentCatalog>,
    passthrough: bool,
) -> AppState {
    let resolver = IdentityResolver::new(policy.clone(), Arc::new(InMemoryProfileStore::new()));
    AppState {
        authenticator: Authenticator::new(ClaimsExtractor::new(TENANT), resolver),
        access: AccessControlEngine::new(policy.clone()),
        policy,
        catalog,
        passthrough: PassthroughContextBuilder::new(passthrough),
    }
}

pub fn app_with(policy: PolicyStore, agents: Vec<AgentDescriptor>) -> TestApp {
    build_router(state_with(policy, Arc::new(StaticCatalog::new(agents)), true)).into_service()
}

pub fn inline_policy(raw: &str) -> PolicyStore {
    PolicyStore::load(PolicySource::Inline(raw.to_string()))
}
