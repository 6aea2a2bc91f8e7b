//! Batch orchestrator.
//!
//! # Data Flow
//! ```text
//! score_batch(items, context)
//!     → validate (cap, ids)                    → Err(Validation) on bad input
//!     → breaker rejecting?                     → every item failed, circuitBreakerOpen
//!     → for each chunk of max_batch_size, in order:
//!           race_all(items, chunk_timeout)
//!               item: cache hit → done
//!                     miss → breaker.execute(scorer.score) → cache on success
//!           unfinished items → timeout failure
//!           rolling failures >= abort threshold or breaker rejecting → stop
//!           (breaker rejections are not rolling failures)
//!     → skipped items → "circuit breaker open" failure
//!     → BatchResult (counts derived from results)
//!     → spawn_persist(successful items)          (detached)
//! ```
//!
//! # Design Decisions
//! - Only validation errors are returned as `Err`; everything else is per-item data
//! - The rolling failure counter lives for one call and is independent of the
//!   breaker's own counter
//! - `circuitBreakerOpen` means the breaker was still rejecting when the batch
//!   finished, or the batch was cut short
//! - Unfinished futures are dropped at the chunk deadline, so they can never
//!   touch the cache or breaker afterwards

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::Instrument;

use crate::config::{OrchestratorConfig, ServiceConfig};
use crate::observability::metrics::{self, ItemOutcome};
use crate::resilience::circuit_breaker::{BreakerError, BreakerStatus, CircuitBreaker};
use crate::resilience::timeouts::race_all;
use crate::scoring::cache::{CacheStats, ResultCache};
use crate::scoring::error::{ScoringError, ValidationError};
use crate::scoring::scorer::Scorer;
use crate::scoring::sink::{spawn_persist, PersistBatch, PersistenceSink};
use crate::scoring::types::{BatchResult, ScoreItem, ScoreRequest, ScoredItem, ScoringContext};

/// Failure reason for items skipped or rejected because the scorer is considered down.
pub const CIRCUIT_OPEN_REASON: &str = "circuit breaker open";

fn timeout_reason(timeout: Duration) -> String {
    format!("timeout: chunk did not complete within {}ms", timeout.as_millis())
}

/// Status snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringStatus {
    pub circuit_breaker: BreakerStatus,
    pub cache: CacheStats,
}

/// Outcome of scoring one item, before aggregation.
struct ItemResult {
    item: ScoredItem,
    outcome: ItemOutcome,
}

/// Scores batches of items through the cache and circuit breaker.
pub struct BatchOrchestrator {
    config: OrchestratorConfig,
    breaker: CircuitBreaker,
    cache: ResultCache,
    scorer: Arc<dyn Scorer>,
    sink: Arc<dyn PersistenceSink>,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

impl BatchOrchestrator {
    /// Build an orchestrator that exclusively owns `breaker` and `cache`.
    pub fn new(
        config: OrchestratorConfig,
        breaker: CircuitBreaker,
        cache: ResultCache,
        scorer: Arc<dyn Scorer>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Result<Self, ValidationError> {
        if config.max_batch_size == 0 {
            return Err(ValidationError::Config("max_batch_size must be greater than zero".into()));
        }
        if config.max_items == 0 {
            return Err(ValidationError::Config("max_items must be greater than zero".into()));
        }
        if config.chunk_timeout_ms == 0 {
            return Err(ValidationError::Config("chunk_timeout_ms must be greater than zero".into()));
        }
        if config.abort_failure_threshold == 0 {
            return Err(ValidationError::Config(
                "abort_failure_threshold must be greater than zero".into(),
            ));
        }

        Ok(Self {
            config,
            breaker,
            cache,
            scorer,
            sink,
        })
    }

    /// Build the breaker and cache from the service configuration.
    pub fn from_config(
        config: &ServiceConfig,
        scorer: Arc<dyn Scorer>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Result<Self, ValidationError> {
        let breaker = CircuitBreaker::new(config.breaker).map_err(|e| ValidationError::Config(e.to_string()))?;
        let cache = ResultCache::from_config(&config.cache);
        Self::new(config.orchestrator, breaker, cache, scorer, sink)
    }

    /// Score `items` against `context`.
    pub async fn score_batch(
        &self,
        items: Vec<ScoreItem>,
        context: ScoringContext,
    ) -> Result<BatchResult, ScoringError> {
        self.validate(&items)?;

        if items.is_empty() {
            return Ok(BatchResult::empty());
        }

        let span = tracing::info_span!(
            "score_batch",
            batch_size = items.len(),
            chunks = items.len().div_ceil(self.config.max_batch_size)
        );
        Ok(self.run(items, context).instrument(span).await)
    }

    async fn run(&self, items: Vec<ScoreItem>, context: ScoringContext) -> BatchResult {
        let start = Instant::now();

        if self.breaker.is_rejecting() {
            tracing::warn!(items = items.len(), "Circuit breaker open; short-circuiting batch");
            let results: Vec<ScoredItem> = items
                .iter()
                .map(|item| {
                    metrics::record_item(ItemOutcome::CircuitOpen);
                    ScoredItem::failed(item.id.clone(), CIRCUIT_OPEN_REASON)
                })
                .collect();
            metrics::record_batch(results.len(), true, start);
            return BatchResult::from_results(results, start.elapsed(), true);
        }

        let context = Arc::new(context);
        let fingerprint = context.fingerprint();
        let chunk_timeout = Duration::from_millis(self.config.chunk_timeout_ms);

        let mut results: Vec<ScoredItem> = Vec::with_capacity(items.len());
        let mut rolling_failures: u32 = 0;
        let mut breaker_rejections = false;
        let mut aborted = false;

        for (chunk_index, chunk) in items.chunks(self.config.max_batch_size).enumerate() {
            let requests: Vec<ScoreRequest> = chunk
                .iter()
                .map(|item| ScoreRequest {
                    item: item.clone(),
                    context: Arc::clone(&context),
                })
                .collect();

            let raced = race_all(
                requests.iter().map(|req| self.score_item(req, &fingerprint)),
                chunk_timeout,
            )
            .await;

            if raced.timed_out {
                metrics::record_chunk_timeout();
                tracing::warn!(
                    chunk = chunk_index,
                    timeout_ms = chunk_timeout.as_millis() as u64,
                    "Chunk timed out; marking pending items failed"
                );
            }

            for (req, output) in requests.iter().zip(raced.outputs) {
                let result = output.unwrap_or_else(|| ItemResult {
                    item: ScoredItem::failed(req.item.id.clone(), timeout_reason(chunk_timeout)),
                    outcome: ItemOutcome::Timeout,
                });

                // Breaker rejections are covered by the is_rejecting check below.
                match result.outcome {
                    ItemOutcome::CircuitOpen => breaker_rejections = true,
                    _ if result.item.success => rolling_failures = 0,
                    _ => rolling_failures += 1,
                }
                metrics::record_item(result.outcome);
                results.push(result.item);
            }

            let remaining = items.len() - results.len();
            if remaining == 0 {
                break;
            }

            if rolling_failures >= self.config.abort_failure_threshold || self.breaker.is_rejecting() {
                tracing::warn!(
                    rolling_failures,
                    breaker = %self.breaker.state(),
                    skipped = remaining,
                    "Aborting remaining chunks"
                );
                aborted = true;
                break;
            }
        }

        if aborted {
            for item in &items[results.len()..] {
                metrics::record_item(ItemOutcome::CircuitOpen);
                results.push(ScoredItem::failed(item.id.clone(), CIRCUIT_OPEN_REASON));
            }
        }

        // Half-open probe overflow is not an outage once the breaker has closed again.
        let circuit_open = aborted || (breaker_rejections && self.breaker.is_rejecting());
        let batch = BatchResult::from_results(results, start.elapsed(), circuit_open);
        metrics::record_batch(items.len(), aborted, start);
        tracing::info!(
            successful = batch.successful,
            failed = batch.failed,
            total_time_ms = batch.total_time_ms,
            circuit_breaker_open = batch.circuit_breaker_open,
            "Batch scored"
        );

        self.persist(&batch, fingerprint);
        batch
    }

    fn validate(&self, items: &[ScoreItem]) -> Result<(), ValidationError> {
        if items.len() > self.config.max_items {
            return Err(ValidationError::TooManyItems {
                count: items.len(),
                max: self.config.max_items,
            });
        }
        if let Some(index) = items.iter().position(|item| item.id.trim().is_empty()) {
            return Err(ValidationError::MissingId { index });
        }
        Ok(())
    }

    async fn score_item(&self, request: &ScoreRequest, fingerprint: &str) -> ItemResult {
        let item_id = &request.item.id;
        let key = ResultCache::key_with_fingerprint(item_id, fingerprint);

        if let Some(cached) = self.cache.get(&key) {
            metrics::record_cache_lookup(true);
            return ItemResult {
                item: cached,
                outcome: ItemOutcome::CacheHit,
            };
        }
        metrics::record_cache_lookup(false);

        match self.breaker.execute(|| self.scorer.score(request)).await {
            Ok(score) => {
                let scored = ScoredItem::scored(item_id.clone(), score);
                self.cache.set(key, scored.clone());
                ItemResult {
                    item: scored,
                    outcome: ItemOutcome::Scored,
                }
            }
            Err(BreakerError::Open) => ItemResult {
                item: ScoredItem::failed(item_id.clone(), CIRCUIT_OPEN_REASON),
                outcome: ItemOutcome::CircuitOpen,
            },
            Err(BreakerError::Inner(e)) => {
                tracing::debug!(item_id = %item_id, error = %e, "Scorer call failed");
                ItemResult {
                    item: ScoredItem::failed(item_id.clone(), e.to_string()),
                    outcome: ItemOutcome::ScorerFailed,
                }
            }
        }
    }

    fn persist(&self, batch: &BatchResult, context_fingerprint: String) {
        let items: Vec<ScoredItem> = batch.results.iter().filter(|r| r.success).cloned().collect();
        if items.is_empty() {
            return;
        }
        spawn_persist(
            Arc::clone(&self.sink),
            PersistBatch {
                context_fingerprint,
                items,
            },
        );
    }

    /// Breaker and cache snapshot.
    pub fn status(&self) -> ScoringStatus {
        ScoringStatus {
            circuit_breaker: self.breaker.status(),
            cache: self.cache.stats(),
        }
    }

    /// Administrative: force the breaker closed.
    pub fn reset_breaker(&self) -> BreakerStatus {
        self.breaker.reset();
        self.breaker.status()
    }

    /// Administrative: drop every cached result.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }
}
