mod common;

use agentgate_authz::{AgentCatalog, AgentDescriptor, CatalogError, Policy, PolicySource, PolicyStore};
use async_trait::async_trait;
use axum::http::StatusCode;
use common::{app_with, get, inline_policy, post, raw_token, read_json, state_with, token};
use gateway::app::build_router;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

const POLICY: &str = r#"{
    "version": "2.0",
    "default_role": "BasicUser",
    "role_permissions": {
        "Admin": {"description": "Full access", "allow_all": true},
        "Analyst": {"agent_patterns": ["data"]},
        "BasicUser": {"agent_patterns": ["general", "chat"]},
        "Finance": {"agent_patterns": []}
    },
    "agent_metadata": {"agents": {"Payroll": {"required_roles": ["Finance"]}}}
}"#;

fn catalog() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new("Admin Console"),
        AgentDescriptor::new("General Chat").with_description("Everyday questions"),
        AgentDescriptor::new("Data Analytics Bot"),
        AgentDescriptor::new("Metadata Cleaner"),
        AgentDescriptor::new("Payroll"),
    ]
}

fn names(body: &serde_json::Value) -> Vec<String> {
    body["agents"]
        .as_array()
        .expect("agents")
        .iter()
        .map(|agent| agent["name"].as_str().expect("name").to_string())
        .collect()
}

struct OfflineCatalog;

#[async_trait]
impl AgentCatalog for OfflineCatalog {
    async fn list_agents(&self) -> Result<Vec<AgentDescriptor>, CatalogError> {
        Err(CatalogError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = app_with(inline_policy(POLICY), catalog());
    let response = app
        .oneshot(get("/v1/system/health", None))
        .await
        .expect("health");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn protected_routes_require_bearer() {
    let app = app_with(inline_policy(POLICY), catalog());
    let response = app
        .clone()
        .oneshot(get("/v1/auth/me", None))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["code"], "unauthorized");
    assert_eq!(body["message"], "missing bearer token");

    let mut request = get("/v1/agents", None);
    request
        .headers_mut()
        .insert("authorization", "Basic dXNlcjpwYXNz".parse().expect("header"));
    let response = app.oneshot(request).await.expect("agents");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_resolves_identity_with_default_role() {
    let app = app_with(inline_policy(POLICY), catalog());
    let token = token(json!({"oid": "u1", "sub": "s1", "email": "a@b.com", "roles": ["Ghost"]}));
    let response = app
        .oneshot(get("/v1/auth/me", Some(&token)))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["subject_id"], "u1");
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["display_name"], "a");
    assert_eq!(body["roles"], json!(["BasicUser"]));
}

#[tokio::test]
async fn expired_and_foreign_tokens_are_unauthorized() {
    let app = app_with(inline_policy(POLICY), catalog());

    let expired = token(json!({"sub": "u1", "exp": chrono::Utc::now().timestamp() - 60}));
    let response = app
        .clone()
        .oneshot(get("/v1/auth/me", Some(&expired)))
        .await
        .expect("expired");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["message"], "token has expired");

    let foreign = raw_token(&json!({"iss": "https://evil.example/", "sub": "u1"}));
    let response = app
        .clone()
        .oneshot(get("/v1/auth/me", Some(&foreign)))
        .await
        .expect("foreign");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["message"], "invalid token issuer");

    let response = app
        .oneshot(get("/v1/auth/me", Some("not-a-jwt")))
        .await
        .expect("garbage");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn builtin_policy_filters_catalog_by_role() {
    let policy = PolicyStore::from_policy(Policy::builtin_default());
    let agents = vec![
        AgentDescriptor::new("Admin Console"),
        AgentDescriptor::new("General Chat"),
    ];
    let app = app_with(policy, agents);

    let basic = token(json!({"sub": "u1"}));
    let response = app
        .clone()
        .oneshot(get("/v1/agents", Some(&basic)))
        .await
        .expect("agents");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(names(&body), vec!["General Chat"]);
    assert_eq!(body["count"], 1);

    let admin = token(json!({"sub": "u2", "roles": ["Admin"]}));
    let response = app
        .oneshot(get("/v1/agents", Some(&admin)))
        .await
        .expect("agents");
    assert_eq!(names(&read_json(response).await), vec!["Admin Console", "General Chat"]);
}

#[tokio::test]
async fn substring_patterns_over_match_in_listing() {
    let app = app_with(inline_policy(POLICY), catalog());
    let analyst = token(json!({"sub": "u1", "roles": ["Analyst"]}));
    let response = app
        .oneshot(get("/v1/agents", Some(&analyst)))
        .await
        .expect("agents");
    assert_eq!(
        names(&read_json(response).await),
        vec!["Data Analytics Bot", "Metadata Cleaner"]
    );
}

#[tokio::test]
async fn agent_detail_statuses() {
    let app = app_with(inline_policy(POLICY), catalog());
    let basic = token(json!({"sub": "u1"}));

    let response = app
        .clone()
        .oneshot(get("/v1/agents/Nope", Some(&basic)))
        .await
        .expect("unknown");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(get("/v1/agents/Admin%20Console", Some(&basic)))
        .await
        .expect("denied");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["code"], "forbidden");

    let response = app
        .clone()
        .oneshot(get("/v1/agents/General%20Chat", Some(&basic)))
        .await
        .expect("allowed");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["agent"]["name"], "General Chat");
    assert_eq!(body["rule"], "pattern:general");
    assert_eq!(body["role"], "BasicUser");

    let finance = token(json!({"sub": "u2", "roles": ["Finance"]}));
    let response = app
        .oneshot(get("/v1/agents/Payroll", Some(&finance)))
        .await
        .expect("override");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["rule"], "metadata_override");
}

#[tokio::test]
async fn catalog_outage_is_service_unavailable() {
    let state = state_with(inline_policy(POLICY), Arc::new(OfflineCatalog), true);
    let app = build_router(state).into_service();
    let response = app
        .oneshot(get("/v1/agents", Some(&token(json!({"sub": "u1"})))))
        .await
        .expect("agents");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json(response).await;
    assert_eq!(body["code"], "catalog_unavailable");
    assert!(!body["message"].as_str().expect("message").contains("refused"));
}

#[tokio::test]
async fn passthrough_context_hides_the_token() {
    let app = app_with(inline_policy(POLICY), catalog());
    let token = token(json!({"oid": "u1", "email": "a@b.com", "name": "Ada"}));
    let response = app
        .oneshot(post("/v1/passthrough/context", Some(&token)))
        .await
        .expect("context");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["passthrough_enabled"], true);
    assert_eq!(body["user_identity"]["subject_id"], "u1");
    assert_eq!(body["user_identity"]["display_name"], "Ada");
    assert_eq!(
        body["header_names"],
        json!(["Authorization", "X-User-Id", "X-User-Email"])
    );
    assert!(!body.to_string().contains(&token));
}

#[tokio::test]
async fn disabled_passthrough_renders_no_headers() {
    let state = state_with(
        inline_policy(POLICY),
        Arc::new(agentgate_authz::StaticCatalog::new(catalog())),
        false,
    );
    let app = build_router(state).into_service();
    let token = token(json!({"sub": "u1"}));
    let response = app
        .clone()
        .oneshot(post("/v1/passthrough/context", Some(&token)))
        .await
        .expect("context");
    let body = read_json(response).await;
    assert_eq!(body["passthrough_enabled"], false);
    assert_eq!(body["header_names"], json!([]));

    let response = app
        .oneshot(get("/v1/passthrough/status", None))
        .await
        .expect("status");
    assert_eq!(read_json(response).await["passthrough_enabled"], false);
}

#[tokio::test]
async fn passthrough_status_is_public_and_reflects_policy() {
    let app = app_with(inline_policy(POLICY), catalog());
    let response = app
        .oneshot(get("/v1/passthrough/status", None))
        .await
        .expect("status");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["policy_version"], "2.0");
    assert_eq!(body["default_role"], "BasicUser");
    assert_eq!(
        body["roles"],
        json!(["Admin", "Analyst", "BasicUser", "Finance"])
    );
    assert_eq!(body["agent_override_count"], 1);
    assert_eq!(body["signature_verification"], false);
    assert_eq!(body["settings"]["enable_pattern_matching"], true);
    assert_eq!(body["settings"]["case_sensitive_patterns"], false);
}

#[tokio::test]
async fn policy_reload_requires_unrestricted_role() {
    let app = app_with(inline_policy(POLICY), catalog());
    let basic = token(json!({"sub": "u1"}));
    let response = app
        .oneshot(post("/v1/admin/policy/reload", Some(&basic)))
        .await
        .expect("reload");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn policy_reload_swaps_only_valid_documents() {
    let file = tempfile::NamedTempFile::new().expect("tempfile");
    std::fs::write(file.path(), POLICY).expect("write v1");
    let policy = PolicyStore::load(PolicySource::File(file.path().to_path_buf()));
    let app = app_with(policy.clone(), catalog());
    let admin = token(json!({"sub": "admin-1", "roles": ["Admin"]}));
    let basic = token(json!({"sub": "u1"}));

    // Grant BasicUser the analytics agents and reload.
    let v3 = POLICY
        .replace("\"2.0\"", "\"3.0\"")
        .replace(r#"["general", "chat"]"#, r#"["general", "chat", "data"]"#);
    std::fs::write(file.path(), v3).expect("write v3");
    let response = app
        .clone()
        .oneshot(post("/v1/admin/policy/reload", Some(&admin)))
        .await
        .expect("reload");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["config_version"], "3.0");

    let response = app
        .clone()
        .oneshot(get("/v1/agents", Some(&basic)))
        .await
        .expect("agents");
    assert_eq!(
        names(&read_json(response).await),
        vec!["General Chat", "Data Analytics Bot", "Metadata Cleaner"]
    );

    // A broken document is reported and the previous policy stays live.
    std::fs::write(file.path(), "{ not json").expect("write broken");
    let response = app
        .clone()
        .oneshot(post("/v1/admin/policy/reload", Some(&admin)))
        .await
        .expect("reload");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await["code"], "policy_reload_failed");
    assert_eq!(policy.current().version, "3.0");

    let response = app
        .oneshot(get("/v1/passthrough/status", None))
        .await
        .expect("status");
    assert_eq!(read_json(response).await["policy_version"], "3.0");
}
