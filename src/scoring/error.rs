//! Scoring error types.

use thiserror::Error;

/// Malformed or oversized input. The only error a batch call returns.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("items is required")]
    MissingItems,

    #[error("items must be a list")]
    ItemsNotList,

    #[error("too many items: {count} (max {max})")]
    TooManyItems { count: usize, max: usize },

    #[error("item at index {index} must be an object")]
    ItemNotObject { index: usize },

    #[error("item at index {index} is missing a non-empty string id")]
    MissingId { index: usize },

    #[error("context must be an object")]
    ContextNotObject,

    #[error("invalid orchestrator configuration: {0}")]
    Config(String),
}

/// Error surfaced by [`BatchOrchestrator::score_batch`](crate::scoring::BatchOrchestrator::score_batch).
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure of a single external scorer call. The display text becomes the item's failure reason.
#[derive(Debug, Error)]
pub enum ScorerError {
    /// The scorer answered with a non-success status.
    #[error("scorer returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection or protocol failure.
    #[error("scorer request failed: {0}")]
    Transport(String),

    /// The scorer answered but the payload was unusable.
    #[error("invalid scorer response: {0}")]
    InvalidResponse(String),

    /// Any other scorer-reported failure; shown verbatim.
    #[error("{0}")]
    Other(String),
}

impl ScorerError {
    /// Whether the HTTP scorer should try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScorerError::Status { status, .. } => *status == 429 || *status >= 500,
            ScorerError::Transport(_) => true,
            ScorerError::InvalidResponse(_) | ScorerError::Other(_) => false,
        }
    }
}

/// Persistence sink failure. Logged, never returned to callers.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("persistence IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("persistence serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
