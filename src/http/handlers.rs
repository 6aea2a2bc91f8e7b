//! Scoring endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::scoring::{BatchRequest, BatchResult, ScoringStatus};

/// `POST /api/score/batch`
pub async fn score_batch(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchResult>, ApiError> {
    let outcome = async {
        let Json(body) = payload?;
        let request = BatchRequest::from_json(body)?;
        let result = state
            .orchestrator
            .score_batch(request.items, request.context)
            .await?;
        Ok::<_, ApiError>(result)
    }
    .await;

    match outcome {
        Ok(result) => {
            metrics::record_score_request(StatusCode::OK.as_u16());
            Ok(Json(result))
        }
        Err(e) => {
            metrics::record_score_request(e.status().as_u16());
            tracing::warn!(error = %e, "Rejected batch request");
            Err(e)
        }
    }
}

/// `GET /api/score/status`
pub async fn score_status(State(state): State<AppState>) -> Json<ScoringStatus> {
    Json(state.orchestrator.status())
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
