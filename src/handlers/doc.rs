//! Documentation endpoint handler.
//!
//! This module provides the `/doc` endpoint handler that displays
//! documentation for the sampler together with the effective settings.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");

    let cfg = &state.config;
    let settings = cfg.sampler_settings();
    let version = env!("CARGO_PKG_VERSION");
    let doc = format!(
        r#"HERAKLES HOST SAMPLER - DOCUMENTATION
=====================================

VERSION: {version}
DESCRIPTION: Host CPU sampler with smoothed Prometheus gauges and debounced alerts

HTTP ENDPOINTS
--------------
GET /metrics     - Prometheus metrics endpoint
GET /health      - Sampler statistics (plain text)
GET /doc         - This documentation (plain text)

AVAILABLE METRICS
-----------------
herakles_host_cpu_user_percent            - EMA of user CPU time
herakles_host_cpu_system_percent          - EMA of system CPU time
herakles_host_cpu_idle_percent            - EMA of idle CPU time
herakles_host_load_average_1m             - 1 minute load average
herakles_host_memory_used_percent         - Memory used excluding buffers/cache
herakles_host_swap_used_percent           - Swap used
herakles_host_sampler_ticks_total         - Sampling ticks since start
herakles_host_sampler_failed_ticks_total  - Ticks aborted by a read failure
herakles_host_alert_triggered             - 1 while the cpu.user alert is active
herakles_host_scrape_duration_seconds     - Time spent serving /metrics

ALERTING
--------
The windowed cpu.user average is compared with the threshold on every tick.
Three consecutive ticks at or above the threshold send an alert; three
consecutive ticks below it send a resolve. No two notifications are sent
within the cooldown.

EFFECTIVE SETTINGS
------------------
threshold:          {threshold:.2}%
sample rate:        {sample_rate:?}
reporting interval: {reporting_interval:?}
alpha:              {alpha:.4}
window size:        {capacity}
cooldown:           {cooldown:?}
hostname:           {hostname}

{FOOTER_TEXT}
"#,
        threshold = settings.threshold,
        sample_rate = settings.sample_rate,
        reporting_interval = settings.reporting_interval,
        alpha = settings.alpha(),
        capacity = settings.capacity(),
        cooldown = settings.cooldown,
        hostname = settings.hostname,
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
