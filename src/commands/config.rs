//! Config file generation command implementation.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Renders a configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> anyhow::Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-host-sampler.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Host Sampler Configuration
# ===================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"               # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                    # HTTP port
#
# Sampling
# --------
# cpu_threshold: 80.0           # Alert when the smoothed cpu.user % reaches this
# sample_rate_ms: 1000          # Period between two /proc/stat reads
# reporting_interval_secs: 60   # EMA alpha = sample rate / reporting interval (at most 86400 samples)
# proc_stat_path: /proc/stat    # CPU counter source
#
# Notifications
# -------------
# alert_cooldown_secs: 300      # Minimum time between two notifications
# slack_url: null               # Slack incoming webhook (null = log only)
# notify_timeout_secs: 10       # Timeout for one webhook request
# hostname: null                # Hostname in messages (null = kernel hostname)
#
# Feature Flags
# -------------
# enable_health: true           # Enable /health endpoint
# enable_host_metrics: true     # Export load/memory/swap gauges
#
# Logging
# -------
# log_level: "info"             # off, error, warn, info, debug, trace (--log-level overrides)
"#;

    format!("{comments}\n{yaml}")
}
