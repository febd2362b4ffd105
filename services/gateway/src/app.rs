//! Gateway HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Every collaborator is constructor-injected through [`AppState`]; there are
//! no process-wide singletons besides the metrics recorder.
use crate::api;
use crate::config::GatewayConfig;
use agentgate_authz::{
    AccessControlEngine, AgentCatalog, Authenticator, ClaimsExtractor, DEFAULT_JWKS_TTL,
    IdentityResolver, InMemoryProfileStore, PassthroughContextBuilder, PolicySource, PolicyStore,
    SignatureVerifier, StaticCatalog, tenant_jwks_url,
};
use anyhow::Context;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub access: AccessControlEngine,
    pub policy: PolicyStore,
    pub catalog: Arc<dyn AgentCatalog>,
    pub passthrough: PassthroughContextBuilder,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route("/v1/auth/me", axum::routing::get(api::auth::me))
        .route("/v1/agents", axum::routing::get(api::agents::list_agents))
        .route(
            "/v1/agents/:name",
            axum::routing::get(api::agents::get_agent),
        )
        .route(
            "/v1/passthrough/context",
            axum::routing::post(api::passthrough::passthrough_context),
        )
        .route(
            "/v1/passthrough/status",
            axum::routing::get(api::passthrough::passthrough_status),
        )
        .route(
            "/v1/admin/policy/reload",
            axum::routing::post(api::admin::reload_policy),
        )
        .layer(trace_layer)
        .with_state(state)
}

/// Wire collaborators from configuration.
pub fn build_state(config: &GatewayConfig) -> anyhow::Result<AppState> {
    // Step 1: Policy never fails to load; it degrades to the built-in default.
    let policy = PolicyStore::load(PolicySource::File(config.policy_path.clone()));

    // Step 2: Catalog. A configured but broken catalog is a startup error.
    let catalog: Arc<dyn AgentCatalog> = match &config.catalog_path {
        Some(path) => Arc::new(
            StaticCatalog::from_file(path)
                .with_context(|| format!("load agent catalog {}", path.display()))?,
        ),
        None => {
            tracing::warn!("AGENTGATE_CATALOG_PATH not set, serving an empty agent catalog");
            Arc::new(StaticCatalog::default())
        }
    };

    // Step 3: Authentication pipeline.
    let resolver = IdentityResolver::new(policy.clone(), Arc::new(InMemoryProfileStore::new()));
    let mut authenticator = Authenticator::new(ClaimsExtractor::new(&config.tenant_id), resolver);
    if config.verify_signatures {
        let jwks_url = config
            .jwks_url
            .clone()
            .unwrap_or_else(|| tenant_jwks_url(&config.tenant_id));
        tracing::info!(%jwks_url, "token signature verification enabled");
        authenticator =
            authenticator.with_verifier(SignatureVerifier::new(jwks_url, DEFAULT_JWKS_TTL));
    }

    Ok(AppState {
        authenticator,
        access: AccessControlEngine::new(policy.clone()),
        policy,
        catalog,
        passthrough: PassthroughContextBuilder::new(config.passthrough_enabled),
    })
}
