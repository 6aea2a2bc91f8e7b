//! Batch scoring subsystem.
//!
//! # Data Flow
//! ```text
//! BatchRequest (validated JSON)
//!     → orchestrator.rs (chunks, concurrency, aggregation)
//!         → cache.rs (hit: done)
//!         → resilience::circuit_breaker → scorer.rs (External Scorer)
//!     → BatchResult to caller
//!     → sink.rs (Persistence Sink, detached)
//! ```
//!
//! # Design Decisions
//! - One orchestrator per process owns its breaker and cache
//! - Items carry a required id plus an open field set validated at the boundary
//! - Persistence is a side channel that cannot change a finished result

pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod scorer;
pub mod sink;
pub mod types;

pub use cache::{CacheStats, ResultCache};
pub use error::{ScorerError, ScoringError, SinkError, ValidationError};
pub use orchestrator::{BatchOrchestrator, ScoringStatus, CIRCUIT_OPEN_REASON};
pub use scorer::{HttpScorer, Scorer};
pub use sink::{spawn_persist, JsonFileSink, NoopSink, PersistBatch, PersistenceSink};
pub use types::{BatchRequest, BatchResult, Score, ScoreItem, ScoreRequest, ScoredItem, ScoringContext};
