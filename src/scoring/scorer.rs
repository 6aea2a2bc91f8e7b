//! External scorer contract and HTTP client.
//!
//! # Responsibilities
//! - Define the single-item scoring contract the orchestrator depends on
//! - Provide an HTTP implementation with internal retries
//!
//! # Design Decisions
//! - Implementations must be safe to call concurrently (`Send + Sync`)
//! - Retries are hidden inside the client; the orchestrator sees one outcome
//! - Only transport errors, 429 and 5xx are retried

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ScorerConfig;
use crate::resilience::backoff::BackoffPolicy;
use crate::scoring::error::ScorerError;
use crate::scoring::types::{Score, ScoreItem, ScoreRequest, ScoringContext};

/// Scores one item against a context.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> Result<Score, ScorerError>;
}

#[derive(Serialize)]
struct ScorePayload<'a> {
    item: &'a ScoreItem,
    context: &'a ScoringContext,
}

/// Scorer backed by a JSON-over-HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpScorer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    backoff: BackoffPolicy,
}

impl HttpScorer {
    pub fn new(config: &ScorerConfig) -> Result<Self, ScorerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ScorerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            backoff: BackoffPolicy::from_config(config),
        })
    }

    async fn attempt(&self, payload: &ScorePayload<'_>) -> Result<Score, ScorerError> {
        let mut req = self.client.post(&self.endpoint).json(payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ScorerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScorerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let score: Score = response
            .json()
            .await
            .map_err(|e| ScorerError::InvalidResponse(e.to_string()))?;

        score
            .bounded()
            .ok_or_else(|| ScorerError::InvalidResponse("score is not a finite number".to_string()))
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<Score, ScorerError> {
        let payload = ScorePayload {
            item: &request.item,
            context: &request.context,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&payload).await {
                Ok(score) => return Ok(score),
                Err(e) if attempt < self.backoff.max_attempts && e.is_retryable() => {
                    let delay = self.backoff.delay(attempt);
                    tracing::debug!(
                        item_id = %request.item.id,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Retrying scorer call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
