//! herakles-host-sampler library.
//!
//! Samples the kernel CPU counters on a fixed period, smooths the per-category
//! rates with a ring-buffered EMA, exports the EMA values for Prometheus and
//! raises debounced alerts when the smoothed user time stays above a threshold.

pub mod alert;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health_stats;
pub mod metrics;
pub mod notifier;
pub mod sample;
pub mod sampler;
pub mod state;
pub mod system;

pub use alert::{AlertDebouncer, AlertEvent, DebounceState};
pub use error::{ConfigError, SampleError};
pub use sample::RingAverage;
pub use sampler::{CpuEmaValues, CpuReporter, CpuSampler, SamplerSettings, TickOutcome};
pub use system::{rate, CounterSource, CpuCategory, CpuSnapshot, ProcStatSource};
