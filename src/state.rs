//! Application state management for the sampler.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers while the sampling task runs in the background.

use prometheus::Registry;
use std::sync::Arc;

use crate::config::Config;
use crate::health_stats::HealthStats;
use crate::metrics::HostMetrics;
use crate::sampler::CpuReporter;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: HostMetrics,
    pub config: Arc<Config>,
    /// Read side of the CPU sampler.
    pub reporter: CpuReporter,
    pub health_stats: Arc<HealthStats>,
}
