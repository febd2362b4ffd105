//! System/health API handlers.
use crate::api::types::HealthStatus;
use axum::Json;

/// Liveness probe. No I/O.
pub(crate) async fn system_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}
