use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

/// Which outbound integrations have complete credentials. Missing ones are
/// not fatal; their tools answer with a configuration error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrationStatus {
    pub crm_configured: bool,
    pub scheduling_configured: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrationChecks {
    pub crm: &'static str,
    pub scheduling: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub integrations: IntegrationChecks,
    pub checked_at: String,
}

pub fn router(integrations: IntegrationStatus) -> Router {
    Router::new().route("/health", get(health)).with_state(integrations)
}

pub async fn health(State(integrations): State<IntegrationStatus>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        service: "sdr-assist-server",
        integrations: IntegrationChecks {
            crm: readiness(integrations.crm_configured),
            scheduling: readiness(integrations.scheduling_configured),
        },
        checked_at: Utc::now().to_rfc3339(),
    })
}

fn readiness(configured: bool) -> &'static str {
    if configured {
        "configured"
    } else {
        "not_configured"
    }
}
