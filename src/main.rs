// herakles-host-sampler - version 0.1.0
// Host CPU sampler with smoothed gauges and debounced alerts
use clap::Parser;
use prometheus::Registry;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn, Level};

use herakles_host_sampler::cli::{Args, Commands, ConfigFormat, LogLevel};
use herakles_host_sampler::commands::{command_check, command_config, command_test};
use herakles_host_sampler::config::{
    resolve_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use herakles_host_sampler::handlers;
use herakles_host_sampler::health_stats::HealthStats;
use herakles_host_sampler::metrics::HostMetrics;
use herakles_host_sampler::notifier::AnyNotifier;
use herakles_host_sampler::sampler::{self, CpuSampler};
use herakles_host_sampler::state::AppState;
use herakles_host_sampler::system::ProcStatSource;

/// Initializes tracing logging subsystem with configured log level
fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let level = config.log_level()?;
    let log_level = match level {
        LogLevel::Off => return Ok(()),
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Logging initialized with level: {:?}", level);
    Ok(())
}

/// Shows configuration in requested format
fn show_config(config: &Config, format: &ConfigFormat) -> anyhow::Result<()> {
    let output = herakles_host_sampler::commands::config::render_config(config, format)?;
    println!("{output}");
    Ok(())
}

/// Exits with status 1 when the effective config is invalid
fn ensure_valid(config: &Config) {
    if let Err(e) = validate_effective_config(config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            ensure_valid(&config);
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, &args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        let config = resolve_config(&args)?;
        setup_logging(&config)?;

        return match command {
            Commands::Check => command_check(&config),
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),
            Commands::Test { iterations, notify } => {
                ensure_valid(&config);
                command_test(*iterations, *notify, &config).await
            }
        };
    }

    // Load configuration for main server mode
    let config = resolve_config(&args)?;
    ensure_valid(&config);

    setup_logging(&config)?;
    info!("Starting herakles-host-sampler");

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = HostMetrics::new(&registry)?;

    let settings = config.sampler_settings();
    info!(
        "Sampling {} every {:?}: threshold {:.2}%, alpha {:.4}, window {}, cooldown {:?}, host {}",
        config.proc_stat_path().display(),
        settings.sample_rate,
        settings.threshold,
        settings.alpha(),
        settings.capacity(),
        settings.cooldown,
        settings.hostname
    );

    let notifier = AnyNotifier::from_url(config.slack_url.as_deref(), config.notify_timeout())?;
    if matches!(notifier, AnyNotifier::Log(_)) {
        warn!("No slack_url configured, notifications are written to the log only");
    }

    let cpu_sampler = CpuSampler::new(settings, ProcStatSource::new(config.proc_stat_path()));
    let health_stats = Arc::new(HealthStats::new());

    let state = Arc::new(AppState {
        registry,
        metrics,
        config: Arc::new(config.clone()),
        reporter: cpu_sampler.reporter(),
        health_stats: Arc::clone(&health_stats),
    });

    // Start background sampling task
    let background_task = tokio::spawn(sampler::run(cpu_sampler, notifier, health_stats));

    // Configure HTTP server routes and start listening
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;
    let app = handlers::router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(
        "herakles-host-sampler listening on http://{}:{}",
        bind_ip_str, port
    );

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                background_task.abort();
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
        }
    }

    // Cleanup: cancel background task before exit
    background_task.abort();
    let _ = background_task.await;

    info!("herakles-host-sampler stopped gracefully");
    Ok(())
}
