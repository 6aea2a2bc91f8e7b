use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::BreakerStatus;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct CacheCleared {
    pub cleared: usize,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn reset_breaker(State(state): State<AppState>) -> Json<BreakerStatus> {
    tracing::info!("Admin reset of circuit breaker");
    Json(state.orchestrator.reset_breaker())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheCleared> {
    let cleared = state.orchestrator.clear_cache();
    Json(CacheCleared { cleared })
}
