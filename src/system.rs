//! Host counters from the /proc filesystem.
//!
//! This module reads the cumulative CPU tick counters used by the sampler,
//! plus the load average and memory figures exported as plain host gauges.

use std::fs;
use std::path::PathBuf;

use crate::error::SampleError;

/// Default location of the kernel CPU counters.
pub const PROC_STAT_PATH: &str = "/proc/stat";

/// CPU time categories tracked per snapshot, in snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuCategory {
    User = 0,
    System = 1,
    Idle = 2,
    Nice = 3,
}

impl CpuCategory {
    /// Categories that feed exported gauges.
    pub const TRACKED: [CpuCategory; 3] = [CpuCategory::User, CpuCategory::System, CpuCategory::Idle];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Gauge name used in log lines and notifications.
    pub fn metric_name(self) -> &'static str {
        match self {
            CpuCategory::User => "cpu.user",
            CpuCategory::System => "cpu.system",
            CpuCategory::Idle => "cpu.idle",
            CpuCategory::Nice => "cpu.nice",
        }
    }
}

/// One reading of the cumulative CPU tick counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSnapshot {
    /// user, system, idle, nice
    pub counters: [u64; 4],
    pub total: u64,
}

impl CpuSnapshot {
    pub fn new(user: u64, system: u64, idle: u64, nice: u64) -> Self {
        let counters = [user, system, idle, nice];
        Self {
            counters,
            total: counters.iter().sum(),
        }
    }

    pub fn get(&self, category: CpuCategory) -> u64 {
        self.counters[category.index()]
    }
}

/// Parses the aggregate `cpu` line of /proc/stat.
///
/// Format: "cpu  user nice system idle iowait irq softirq steal ..."
pub fn parse_cpu_snapshot(content: &str) -> Result<CpuSnapshot, SampleError> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or(SampleError::MissingCpuLine)?;

    let fields: Vec<&str> = line.split_whitespace().skip(1).collect();
    if fields.len() < 4 {
        return Err(SampleError::Parse(format!(
            "expected at least 4 counters, got {}",
            fields.len()
        )));
    }

    let parse = |idx: usize, name: &str| {
        fields[idx]
            .parse::<u64>()
            .map_err(|e| SampleError::Parse(format!("{} counter '{}': {}", name, fields[idx], e)))
    };

    let user = parse(0, "user")?;
    let nice = parse(1, "nice")?;
    let system = parse(2, "system")?;
    let idle = parse(3, "idle")?;

    Ok(CpuSnapshot::new(user, system, idle, nice))
}

/// Source of cumulative CPU counter snapshots.
pub trait CounterSource: Send {
    fn read(&mut self) -> Result<CpuSnapshot, SampleError>;
}

/// Reads counters from a /proc/stat formatted file.
#[derive(Debug, Clone)]
pub struct ProcStatSource {
    path: PathBuf,
}

impl ProcStatSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcStatSource {
    fn default() -> Self {
        Self::new(PROC_STAT_PATH)
    }
}

impl CounterSource for ProcStatSource {
    fn read(&mut self) -> Result<CpuSnapshot, SampleError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SampleError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_cpu_snapshot(&content)
    }
}

/// Percentage of the elapsed tick budget spent in `category`.
///
/// Returns 0 until both snapshots exist, and whenever the total did not move.
pub fn rate(
    category: CpuCategory,
    previous: Option<&CpuSnapshot>,
    current: Option<&CpuSnapshot>,
) -> f64 {
    let (previous, current) = match (previous, current) {
        (Some(p), Some(c)) => (p, c),
        _ => return 0.0,
    };

    let total = current.total.saturating_sub(previous.total);
    if total == 0 {
        return 0.0;
    }
    let delta = current.get(category).saturating_sub(previous.get(category));

    delta as f64 / total as f64 * 100.0
}

/// System load averages for 1, 5, and 15 minute intervals.
#[derive(Debug, Clone, Copy)]
pub struct LoadAverage {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
}

/// Memory and swap utilization in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    pub memory_percent: f64,
    pub swap_percent: f64,
}

/// Reads load average from /proc/loadavg.
pub fn read_load_average() -> Result<LoadAverage, String> {
    let content = fs::read_to_string("/proc/loadavg")
        .map_err(|e| format!("Failed to read /proc/loadavg: {}", e))?;
    parse_load_average(&content)
}

/// Parses /proc/loadavg content.
///
/// Format: "0.00 0.01 0.05 1/234 5678"
pub fn parse_load_average(content: &str) -> Result<LoadAverage, String> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(format!(
            "Invalid /proc/loadavg format: expected at least 3 fields, got {}",
            parts.len()
        ));
    }

    let one_min = parts[0]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 1min load average: {}", e))?;
    let five_min = parts[1]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 5min load average: {}", e))?;
    let fifteen_min = parts[2]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 15min load average: {}", e))?;

    Ok(LoadAverage {
        one_min,
        five_min,
        fifteen_min,
    })
}

/// Reads memory and swap utilization from /proc/meminfo.
pub fn read_memory_usage() -> Result<MemoryUsage, String> {
    let content = fs::read_to_string("/proc/meminfo")
        .map_err(|e| format!("Failed to read /proc/meminfo: {}", e))?;
    Ok(parse_memory_usage(&content))
}

/// Computes utilization from /proc/meminfo content.
///
/// Available memory is MemFree + Buffers + Cached. Missing totals yield 0%.
pub fn parse_memory_usage(content: &str) -> MemoryUsage {
    let mut mem_total = 0.0;
    let mut mem_free = 0.0;
    let mut buffers = 0.0;
    let mut cached = 0.0;
    let mut swap_total = 0.0;
    let mut swap_free = 0.0;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let key = match parts.next() {
            Some(k) => k,
            None => continue,
        };
        let value = match parts.next().and_then(|v| v.parse::<f64>().ok()) {
            Some(v) => v,
            None => continue,
        };
        match key {
            "MemTotal:" => mem_total = value,
            "MemFree:" => mem_free = value,
            "Buffers:" => buffers = value,
            "Cached:" => cached = value,
            "SwapTotal:" => swap_total = value,
            "SwapFree:" => swap_free = value,
            _ => {}
        }
    }

    let memory_percent = if mem_total != 0.0 {
        (mem_total - (mem_free + buffers + cached)) / mem_total * 100.0
    } else {
        0.0
    };
    let swap_percent = if swap_total != 0.0 {
        (swap_total - swap_free) / swap_total * 100.0
    } else {
        0.0
    };

    MemoryUsage {
        memory_percent,
        swap_percent,
    }
}

/// Kernel hostname, used when none is configured.
pub fn read_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for writes of buf.len() bytes.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
