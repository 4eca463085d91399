//! System check command implementation.

use std::path::Path;

use crate::config::{validate_effective_config, Config};
use crate::system::{self, CounterSource, CpuCategory, ProcStatSource};

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> anyhow::Result<()> {
    println!("🔍 Herakles Host Sampler - System Check");
    println!("=======================================");

    let mut all_ok = true;

    // Check CPU counters
    let stat_path = config.proc_stat_path();
    println!("\n📁 Checking CPU counters at {}...", stat_path.display());
    if Path::new(&stat_path).exists() {
        match ProcStatSource::new(&stat_path).read() {
            Ok(snap) => {
                println!(
                    "   ✅ Counters readable: user={} system={} idle={} nice={} (total {})",
                    snap.get(CpuCategory::User),
                    snap.get(CpuCategory::System),
                    snap.get(CpuCategory::Idle),
                    snap.get(CpuCategory::Nice),
                    snap.total
                );
            }
            Err(e) => {
                println!("   ❌ Cannot parse CPU counters: {}", e);
                all_ok = false;
            }
        }
    } else {
        println!("   ❌ {} not found", stat_path.display());
        all_ok = false;
    }

    // Host gauges are optional; failures only warn
    if config.enable_host_metrics.unwrap_or(true) {
        println!("\n💾 Checking load and memory counters...");
        match system::read_load_average() {
            Ok(load) => println!("   ✅ Load average: {:.2}", load.one_min),
            Err(e) => println!("   ⚠️  {}", e),
        }
        match system::read_memory_usage() {
            Ok(mem) => println!(
                "   ✅ Memory used: {:.1}%, swap used: {:.1}%",
                mem.memory_percent, mem.swap_percent
            ),
            Err(e) => println!("   ⚠️  {}", e),
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            let settings = config.sampler_settings();
            println!("   ✅ Configuration is valid");
            println!(
                "   ├─ alpha {:.4}, window {} samples",
                settings.alpha(),
                settings.capacity()
            );
            println!("   └─ hostname: {}", settings.hostname);
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        anyhow::bail!("system check failed")
    }
}
