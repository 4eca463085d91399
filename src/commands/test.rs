//! Foreground sampling command implementation.

use std::time::Instant;
use tokio::time::sleep;

use crate::alert::AlertEvent;
use crate::config::Config;
use crate::notifier::{AnyNotifier, Notifier};
use crate::sampler::CpuSampler;
use crate::system::{CpuCategory, ProcStatSource};

/// Runs the sampler for a number of ticks and prints every result.
pub async fn command_test(iterations: usize, notify: bool, config: &Config) -> anyhow::Result<()> {
    println!("🧪 Herakles Host Sampler - Test Mode");
    println!("====================================");

    let settings = config.sampler_settings();
    let period = settings.sample_rate;
    let hostname = settings.hostname.clone();
    println!(
        "   threshold {:.2}%, period {:?}, alpha {:.4}, window {}",
        settings.threshold,
        period,
        settings.alpha(),
        settings.capacity()
    );

    let notifier = if notify {
        Some(AnyNotifier::from_url(config.slack_url.as_deref(), config.notify_timeout())?)
    } else {
        None
    };

    let mut sampler = CpuSampler::new(settings, ProcStatSource::new(config.proc_stat_path()));
    sampler.prime()?;
    let reporter = sampler.reporter();

    let mut failures = 0usize;
    for iteration in 1..=iterations {
        sleep(period).await;
        println!("\n🔄 Tick {}/{}:", iteration, iterations);

        match sampler.tick(Instant::now()) {
            Ok(outcome) => {
                let ema = reporter.ema_values();
                for category in CpuCategory::TRACKED {
                    if let Some(value) = ema.get(category) {
                        println!(
                            "   ├─ {:10} rate {:6.2}%  ema {:6.2}%",
                            category.metric_name(),
                            outcome.rates[category.index()],
                            value
                        );
                    }
                }
                println!(
                    "   └─ windowed cpu.user average {:.2}% (alert count {}, resolve count {})",
                    outcome.average,
                    sampler.debouncer().alert_count(),
                    sampler.debouncer().resolve_count()
                );

                if let Some(event) = outcome.event {
                    let text = event.message(CpuCategory::User.metric_name());
                    match event {
                        AlertEvent::Alert { .. } => println!("   🚨 {}", text),
                        AlertEvent::Resolved => println!("   ✅ {}", text),
                    }
                    if let Some(n) = &notifier {
                        n.notify(&hostname, &text).await;
                    }
                }
            }
            Err(e) => {
                failures += 1;
                println!("   ❌ Tick failed: {}", e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} ticks failed", failures, iterations);
    }
    println!("\n✅ Test completed successfully");
    Ok(())
}
