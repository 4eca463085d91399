//! HTTP endpoint handlers for the sampler.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/doc`: Documentation endpoint

pub mod doc;
pub mod health;
pub mod metrics;

// Re-export handlers
pub use doc::doc_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;

use axum::{routing::get, Router};

use crate::state::SharedState;

/// Builds the HTTP router for the effective configuration.
pub fn router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/doc", get(doc_handler));

    if state.config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    app.with_state(state)
}
