//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Item scoring call:
//!     → timeouts.rs (chunk deadline shared by all items in the chunk)
//!     → circuit_breaker.rs (fail fast when the scorer is down, track outcomes)
//!     → scorer-internal retries paced by backoff.rs
//! ```
//!
//! # Design Decisions
//! - Every chunk has a deadline; late work is dropped, not awaited
//! - The breaker only sees calls it admitted
//! - Retry pacing is internal to the scorer client and opaque to the orchestrator

pub mod backoff;
pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerState, BreakerStatus, CircuitBreaker};
