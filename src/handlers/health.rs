//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! sampler statistics as a plain-text table.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::sampler::CpuEmaValues;
use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str =
    "More info: https://www.herakles.io - Support: proc-mem@herakles.io";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let stats = &state.health_stats;

    // Healthy once a tick has completed
    let status = if stats.successful_ticks() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = if stats.successful_ticks() == 0 {
        "Waiting for first sample"
    } else if stats.alert_triggered() {
        "OK - cpu.user alert active"
    } else {
        "OK"
    };

    let table = stats.render_table();
    let averages = render_averages(&state.reporter.ema_values());

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\n{table}\n{averages}\n{FOOTER_TEXT}"),
    )
}

/// Renders the current EMA values as a plain-text table.
fn render_averages(values: &CpuEmaValues) -> String {
    let mut out = String::new();
    writeln!(out, "CPU MOVING AVERAGES").ok();
    writeln!(out, "===================").ok();
    writeln!(out).ok();
    writeln!(out, "{:12} | {:>10}", "gauge", "percent").ok();
    writeln!(out, "{}", "-".repeat(25)).ok();
    writeln!(out, "{:12} | {:>10.2}", "cpu.user", values.user).ok();
    writeln!(out, "{:12} | {:>10.2}", "cpu.system", values.system).ok();
    writeln!(out, "{:12} | {:>10.2}", "cpu.idle", values.idle).ok();
    out
}
