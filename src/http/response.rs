//! API error mapping.
//!
//! # Responsibilities
//! - Map scoring errors and body rejections to HTTP status codes
//! - Render every error as `{"error": "..."}`
//!
//! # Design Decisions
//! - Validation problems are 400; nothing else in the scoring path is an HTTP error
//! - Unreadable bodies keep axum's status (400, 413, 415, 422) but use our JSON shape

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::scoring::{ScoringError, ValidationError};

/// Error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The body was not a JSON document with a JSON content type.
    #[error("invalid request body: {}", .0.body_text())]
    Body(#[from] JsonRejection),
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::Validation(e) => ApiError::Validation(e),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Body(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
