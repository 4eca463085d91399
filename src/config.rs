//! Configuration loading and validation.
//!
//! Precedence is CLI > config file > defaults. Files are YAML, JSON or TOML,
//! chosen by extension.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::{Args, LogLevel};
use crate::error::ConfigError;
use crate::notifier::DEFAULT_NOTIFY_TIMEOUT;
use crate::sampler::{SamplerSettings, MAX_WINDOW_SAMPLES};
use crate::system;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_CPU_THRESHOLD: f64 = 80.0;
pub const DEFAULT_SAMPLE_RATE_MS: u64 = 1000;
pub const DEFAULT_REPORTING_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 300;

/// Default config file search locations, in order.
pub const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/herakles/host-sampler.yaml",
    "/etc/herakles/host-sampler.yml",
    "/etc/herakles/host-sampler.json",
    "./herakles-host-sampler.yaml",
    "./herakles-host-sampler.yml",
    "./herakles-host-sampler.json",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Sampling
    /// Alert threshold for the windowed cpu.user average, in percent
    #[serde(alias = "threshold")]
    pub cpu_threshold: Option<f64>,
    #[serde(alias = "sample-rate-ms")]
    pub sample_rate_ms: Option<u64>,
    #[serde(alias = "reporting-interval-secs")]
    pub reporting_interval_secs: Option<u64>,
    pub proc_stat_path: Option<PathBuf>,

    // Notifications
    #[serde(alias = "slack-interval-secs")]
    pub alert_cooldown_secs: Option<u64>,
    #[serde(alias = "slack-url")]
    pub slack_url: Option<String>,
    pub notify_timeout_secs: Option<u64>,
    /// Hostname in notifications; the kernel hostname when unset
    pub hostname: Option<String>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_host_metrics: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            cpu_threshold: Some(DEFAULT_CPU_THRESHOLD),
            sample_rate_ms: Some(DEFAULT_SAMPLE_RATE_MS),
            reporting_interval_secs: Some(DEFAULT_REPORTING_INTERVAL_SECS),
            proc_stat_path: Some(PathBuf::from(system::PROC_STAT_PATH)),
            alert_cooldown_secs: Some(DEFAULT_ALERT_COOLDOWN_SECS),
            slack_url: None,
            notify_timeout_secs: Some(DEFAULT_NOTIFY_TIMEOUT.as_secs()),
            hostname: None,
            enable_health: Some(true),
            enable_host_metrics: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn sample_rate(&self) -> Duration {
        Duration::from_millis(self.sample_rate_ms.unwrap_or(DEFAULT_SAMPLE_RATE_MS))
    }

    pub fn reporting_interval(&self) -> Duration {
        Duration::from_secs(
            self.reporting_interval_secs
                .unwrap_or(DEFAULT_REPORTING_INTERVAL_SECS),
        )
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs.unwrap_or(DEFAULT_ALERT_COOLDOWN_SECS))
    }

    pub fn notify_timeout(&self) -> Duration {
        self.notify_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_NOTIFY_TIMEOUT)
    }

    pub fn proc_stat_path(&self) -> PathBuf {
        self.proc_stat_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(system::PROC_STAT_PATH))
    }

    /// Log level from the config, `info` when unset.
    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        match self.log_level.as_deref().map(str::trim) {
            None | Some("") => Ok(LogLevel::Info),
            Some(name) => LogLevel::from_str(name, true).map_err(|_| {
                ConfigError::invalid(
                    "log_level",
                    format!("'{}' is not one of off, error, warn, info, debug, trace", name),
                )
            }),
        }
    }

    /// Configured hostname, else the kernel hostname, else "localhost".
    pub fn effective_hostname(&self) -> String {
        self.hostname
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .or_else(system::read_hostname)
            .unwrap_or_else(|| "localhost".to_string())
    }

    fn sampler_window_samples(&self) -> f64 {
        SamplerSettings {
            threshold: 0.0,
            sample_rate: self.sample_rate(),
            reporting_interval: self.reporting_interval(),
            cooldown: Duration::ZERO,
            hostname: String::new(),
        }
        .window_samples()
    }

    /// Engine parameters; call after `validate_effective_config`.
    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            threshold: self.cpu_threshold.unwrap_or(DEFAULT_CPU_THRESHOLD),
            sample_rate: self.sample_rate(),
            reporting_interval: self.reporting_interval(),
            cooldown: self.alert_cooldown(),
            hostname: self.effective_hostname(),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    let threshold = cfg.cpu_threshold.unwrap_or(DEFAULT_CPU_THRESHOLD);
    if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
        return Err(ConfigError::invalid(
            "cpu_threshold",
            format!("{} is not a percentage between 0 and 100", threshold),
        ));
    }

    let sample_rate = cfg.sample_rate();
    if sample_rate.is_zero() {
        return Err(ConfigError::invalid("sample_rate_ms", "must be greater than 0"));
    }

    let reporting_interval = cfg.reporting_interval();
    if reporting_interval < sample_rate {
        return Err(ConfigError::invalid(
            "reporting_interval_secs",
            format!(
                "{:?} is shorter than the sample rate {:?}",
                reporting_interval, sample_rate
            ),
        ));
    }

    let window = cfg.sampler_window_samples();
    if window > MAX_WINDOW_SAMPLES as f64 {
        return Err(ConfigError::invalid(
            "reporting_interval_secs",
            format!(
                "{:?} spans {} samples of {:?}, more than the maximum window of {}",
                reporting_interval, window, sample_rate, MAX_WINDOW_SAMPLES
            ),
        ));
    }

    cfg.log_level()?;

    if cfg.notify_timeout().is_zero() {
        return Err(ConfigError::invalid("notify_timeout_secs", "must be greater than 0"));
    }

    if let Some(url) = cfg.slack_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "slack_url",
                format!("'{}' is not an http(s) URL", url),
            ));
        }
    }

    Ok(())
}

/// Loads a config file, falling back to the default locations and then to
/// built-in defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        anyhow::bail!("config file not found: {}", path.display());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
pub fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        merge_defaults(load_config(args.config.as_deref())?)
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }
    if let Some(threshold) = args.threshold {
        config.cpu_threshold = Some(threshold);
    }
    if let Some(ms) = args.sample_rate_ms {
        config.sample_rate_ms = Some(ms);
    }
    if let Some(secs) = args.reporting_interval_secs {
        config.reporting_interval_secs = Some(secs);
    }
    if let Some(secs) = args.cooldown_secs {
        config.alert_cooldown_secs = Some(secs);
    }
    if let Some(host) = &args.hostname {
        config.hostname = Some(host.clone());
    }
    if let Some(url) = &args.slack_url {
        config.slack_url = Some(url.clone());
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_host_metrics {
        config.enable_host_metrics = Some(false);
    }

    Ok(config)
}

/// Fills fields left unset in a file with the built-in defaults.
pub fn merge_defaults(mut cfg: Config) -> Config {
    let d = Config::default();
    cfg.port = cfg.port.or(d.port);
    cfg.bind = cfg.bind.or(d.bind);
    cfg.cpu_threshold = cfg.cpu_threshold.or(d.cpu_threshold);
    cfg.sample_rate_ms = cfg.sample_rate_ms.or(d.sample_rate_ms);
    cfg.reporting_interval_secs = cfg.reporting_interval_secs.or(d.reporting_interval_secs);
    cfg.proc_stat_path = cfg.proc_stat_path.or(d.proc_stat_path);
    cfg.alert_cooldown_secs = cfg.alert_cooldown_secs.or(d.alert_cooldown_secs);
    cfg.notify_timeout_secs = cfg.notify_timeout_secs.or(d.notify_timeout_secs);
    cfg.enable_health = cfg.enable_health.or(d.enable_health);
    cfg.enable_host_metrics = cfg.enable_host_metrics.or(d.enable_host_metrics);
    cfg.log_level = cfg.log_level.or(d.log_level);
    cfg
}
