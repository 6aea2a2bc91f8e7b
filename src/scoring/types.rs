//! Scoring data model.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::scoring::error::ValidationError;

/// Fingerprint length in hex characters.
const FINGERPRINT_LEN: usize = 16;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One item to score: a required id plus whatever fields the caller sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreItem {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ScoreItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Request-scoped context shared by every item in a batch (user profile, preferences, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringContext(Map<String, Value>);

impl ScoringContext {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Short, stable digest of the context. Key order does not matter.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(&canonicalize(&Value::Object(self.0.clone())))
            .unwrap_or_default();
        let hash = blake3::hash(&canonical);
        let mut hex = hash.to_hex().to_string();
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|k| (k.clone(), canonicalize(&map[k.as_str()])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// One item plus its context, as handed to a scorer. Immutable once built.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub item: ScoreItem,
    pub context: Arc<ScoringContext>,
}

/// What a scorer produces for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub compromises: Vec<String>,
}

impl Score {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 100.0;

    /// Clamp into the valid range. Non-finite scores are rejected.
    pub fn bounded(mut self) -> Option<Self> {
        if !self.score.is_finite() {
            return None;
        }
        self.score = self.score.clamp(Self::MIN, Self::MAX);
        Some(self)
    }
}

/// Per-item result returned to callers and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem {
    pub item_id: String,
    pub score: f64,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compromises: Option<Vec<String>>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
}

impl ScoredItem {
    pub fn scored(item_id: impl Into<String>, score: Score) -> Self {
        Self {
            item_id: item_id.into(),
            score: score.score,
            reasons: score.reasons,
            compromises: (!score.compromises.is_empty()).then_some(score.compromises),
            success: true,
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn failed(item_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            score: 0.0,
            reasons: Vec::new(),
            compromises: None,
            success: false,
            error: Some(reason.into()),
            timestamp: now_millis(),
        }
    }
}

/// Aggregate outcome of one batch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<ScoredItem>,
    pub total_time_ms: u64,
    pub circuit_breaker_open: bool,
}

impl BatchResult {
    /// Counts are derived from `results`, so they always reconcile.
    pub fn from_results(results: Vec<ScoredItem>, elapsed: Duration, circuit_breaker_open: bool) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            successful,
            failed: results.len() - successful,
            results,
            total_time_ms: elapsed.as_millis() as u64,
            circuit_breaker_open,
        }
    }

    pub fn empty() -> Self {
        Self::from_results(Vec::new(), Duration::ZERO, false)
    }
}

/// Validated wire request: `{ items: [{id, ...}], context: {...} }`.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub items: Vec<ScoreItem>,
    pub context: ScoringContext,
}

impl BatchRequest {
    /// Check the shape of a raw JSON body.
    ///
    /// The item cap is enforced by the orchestrator, which owns that limit.
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let mut body = match body {
            Value::Object(map) => map,
            _ => return Err(ValidationError::MissingItems),
        };

        let raw_items = match body.remove("items") {
            None | Some(Value::Null) => return Err(ValidationError::MissingItems),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ValidationError::ItemsNotList),
        };

        let context = match body.remove("context") {
            None | Some(Value::Null) => ScoringContext::default(),
            Some(Value::Object(map)) => ScoringContext::new(map),
            Some(_) => return Err(ValidationError::ContextNotObject),
        };

        let items = raw_items
            .into_iter()
            .enumerate()
            .map(|(index, raw)| parse_item(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { items, context })
    }
}

fn parse_item(index: usize, raw: Value) -> Result<ScoreItem, ValidationError> {
    let mut fields = match raw {
        Value::Object(map) => map,
        _ => return Err(ValidationError::ItemNotObject { index }),
    };
    let id = match fields.remove("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        _ => return Err(ValidationError::MissingId { index }),
    };
    Ok(ScoreItem { id, fields })
}
