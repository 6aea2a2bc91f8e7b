//! Resilient batch scoring service.
//!
//! Scores groups of listings against a user context by calling an unreliable
//! external scorer through a circuit breaker and a result cache, in bounded
//! concurrent chunks, and always answers with per-item results.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod scoring;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use scoring::BatchOrchestrator;
