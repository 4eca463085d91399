//! CLI arguments and subcommands for herakles-host-sampler.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Name as accepted on the command line and in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-host-sampler",
    about = "Host CPU sampler with smoothed Prometheus gauges and debounced alerts",
    long_about = "Host CPU sampler with smoothed Prometheus gauges and debounced alerts.\n\n\
                  Samples /proc/stat on a fixed period, keeps an exponential moving average \
                  of CPU user/system/idle time for Prometheus, and sends an alert to a \
                  Slack-compatible webhook when the smoothed user time stays above a threshold.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version = "0.1.0",
    propagate_version = true,
    after_help = "More info: https://www.herakles.io - Support: proc-mem@herakles.io"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides log_level from the config file) [default: info]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Alert threshold for the smoothed cpu.user percentage
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Sampling period in milliseconds
    #[arg(long)]
    pub sample_rate_ms: Option<u64>,

    /// Reporting interval in seconds (sets EMA alpha and window size)
    #[arg(long)]
    pub reporting_interval_secs: Option<u64>,

    /// Minimum seconds between two notifications
    #[arg(long)]
    pub cooldown_secs: Option<u64>,

    /// Hostname used in notifications
    #[arg(long)]
    pub hostname: Option<String>,

    /// Slack incoming webhook URL (notifications are logged when unset)
    #[arg(long)]
    pub slack_url: Option<String>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable load/memory/swap gauges
    #[arg(long)]
    pub disable_host_metrics: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check,

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run the sampler in the foreground and print every tick
    Test {
        /// Number of sampling ticks
        #[arg(short = 'n', long, default_value_t = 5)]
        iterations: usize,

        /// Send notifications through the configured notifier
        #[arg(long)]
        notify: bool,
    },
}
