//! Axum HTTP API server for asynchronous video generation.
//!
//! This crate provides:
//! - Generation submission against the KIE Veo provider
//! - The provider callback endpoint and client-driven status poller
//! - The shared finalization sequence (archive, sign, persist, extend)
//! - Prometheus metrics

pub mod config;
pub mod error;
#[cfg(test)]
mod fakes;
pub mod finalize;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
