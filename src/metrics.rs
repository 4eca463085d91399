//! Prometheus metrics definitions for herakles-host-sampler.
//!
//! CPU gauges carry the EMA of each tracked category. Host gauges (load,
//! memory, swap) are read straight from /proc at scrape time.

use prometheus::{Gauge, Opts, Registry};
use tracing::{debug, warn};

use crate::health_stats::HealthStats;
use crate::system::{self, CpuCategory};

/// Collection of Prometheus metrics exported by the sampler.
#[derive(Clone)]
pub struct HostMetrics {
    pub cpu_user: Gauge,
    pub cpu_system: Gauge,
    pub cpu_idle: Gauge,

    // Host gauges
    pub load_average_1m: Gauge,
    pub memory_used: Gauge,
    pub swap_used: Gauge,

    // Exporter telemetry
    pub ticks_total: Gauge,
    pub failed_ticks_total: Gauge,
    pub alert_triggered: Gauge,
    pub scrape_duration: Gauge,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let g = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

impl HostMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            cpu_user: gauge(
                registry,
                "herakles_host_cpu_user_percent",
                "Exponential moving average of CPU time spent in user mode, in percent",
            )?,
            cpu_system: gauge(
                registry,
                "herakles_host_cpu_system_percent",
                "Exponential moving average of CPU time spent in kernel mode, in percent",
            )?,
            cpu_idle: gauge(
                registry,
                "herakles_host_cpu_idle_percent",
                "Exponential moving average of idle CPU time, in percent",
            )?,
            load_average_1m: gauge(
                registry,
                "herakles_host_load_average_1m",
                "System load average over 1 minute",
            )?,
            memory_used: gauge(
                registry,
                "herakles_host_memory_used_percent",
                "Memory in use excluding buffers and page cache, in percent",
            )?,
            swap_used: gauge(
                registry,
                "herakles_host_swap_used_percent",
                "Swap in use, in percent",
            )?,
            ticks_total: gauge(
                registry,
                "herakles_host_sampler_ticks_total",
                "Number of sampling ticks since start",
            )?,
            failed_ticks_total: gauge(
                registry,
                "herakles_host_sampler_failed_ticks_total",
                "Number of sampling ticks aborted by a counter read failure",
            )?,
            alert_triggered: gauge(
                registry,
                "herakles_host_alert_triggered",
                "Whether the cpu.user alert is currently triggered (1) or not (0)",
            )?,
            scrape_duration: gauge(
                registry,
                "herakles_host_scrape_duration_seconds",
                "Time spent serving the /metrics request",
            )?,
        })
    }

    /// Gauge holding the EMA of a tracked category.
    pub fn cpu_gauge(&self, category: CpuCategory) -> Option<&Gauge> {
        match category {
            CpuCategory::User => Some(&self.cpu_user),
            CpuCategory::System => Some(&self.cpu_system),
            CpuCategory::Idle => Some(&self.cpu_idle),
            CpuCategory::Nice => None,
        }
    }

    /// Refreshes load and memory gauges; a failed read zeroes its gauges.
    pub fn update_host_gauges(&self) {
        match system::read_load_average() {
            Ok(load) => self.load_average_1m.set(load.one_min),
            Err(e) => {
                warn!("Failed to read load average: {}", e);
                self.load_average_1m.set(0.0);
            }
        }

        match system::read_memory_usage() {
            Ok(mem) => {
                self.memory_used.set(mem.memory_percent);
                self.swap_used.set(mem.swap_percent);
            }
            Err(e) => {
                warn!("Failed to read memory usage: {}", e);
                self.memory_used.set(0.0);
                self.swap_used.set(0.0);
            }
        }
        debug!("Host gauges refreshed");
    }

    /// Copies sampler statistics into the telemetry gauges.
    pub fn update_telemetry(&self, stats: &HealthStats) {
        self.ticks_total.set(stats.total_ticks() as f64);
        self.failed_ticks_total.set(stats.failed_ticks() as f64);
        self.alert_triggered
            .set(if stats.alert_triggered() { 1.0 } else { 0.0 });
    }
}
