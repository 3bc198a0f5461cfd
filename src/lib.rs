#![deny(missing_docs)]

//! Core library for the Docweave knowledge-base pipeline.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// URL fetching and main-content extraction.
pub mod fetch;
/// In-memory job-state store for background pipeline runs.
pub mod jobs;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline run counters.
pub mod metrics;
/// The chunk → repair → embed → cluster → summarize pipeline.
pub mod pipeline;
/// Generation and embedding provider abstractions.
pub mod providers;
/// Global call-rate throttling for provider backends.
pub mod ratelimit;
