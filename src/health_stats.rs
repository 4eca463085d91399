//! Running statistics about the sampler, rendered on `/health`.

use chrono::{DateTime, Utc};
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

#[derive(Default)]
struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// (last, avg, max, min)
    fn snapshot(&self) -> (f64, f64, f64, f64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min)
        } else {
            (0.0, 0.0, 0.0, 0.0)
        }
    }
}

/// Last notification that left the sampler.
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub at: DateTime<Utc>,
    pub text: String,
}

pub struct HealthStats {
    started_at: Instant,
    tick_duration_seconds: Stat,
    user_average: Stat,
    total_ticks: AtomicU64,
    failed_ticks: AtomicU64,
    successful_ticks: AtomicU64,
    alerts_sent: AtomicU64,
    resolves_sent: AtomicU64,
    alert_triggered: AtomicU64,
    last_notification: Mutex<Option<NotificationRecord>>,
    last_error: Mutex<Option<String>>,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            tick_duration_seconds: Stat::default(),
            user_average: Stat::default(),
            total_ticks: AtomicU64::new(0),
            failed_ticks: AtomicU64::new(0),
            successful_ticks: AtomicU64::new(0),
            alerts_sent: AtomicU64::new(0),
            resolves_sent: AtomicU64::new(0),
            alert_triggered: AtomicU64::new(0),
            last_notification: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_tick(&self, duration_seconds: f64, user_average: f64) {
        self.tick_duration_seconds.add_sample(duration_seconds);
        self.user_average.add_sample(user_average);
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
        self.successful_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_tick(&self, error: &str) {
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
        self.failed_ticks.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error.to_string());
        }
    }

    /// Records a dispatched notification; `alert` is false for resolves.
    pub fn record_notification(&self, alert: bool, text: &str) {
        if alert {
            self.alerts_sent.fetch_add(1, Ordering::Relaxed);
            self.alert_triggered.store(1, Ordering::Relaxed);
        } else {
            self.resolves_sent.fetch_add(1, Ordering::Relaxed);
            self.alert_triggered.store(0, Ordering::Relaxed);
        }
        if let Ok(mut last) = self.last_notification.lock() {
            *last = Some(NotificationRecord {
                at: Utc::now(),
                text: text.to_string(),
            });
        }
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks.load(Ordering::Relaxed)
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks.load(Ordering::Relaxed)
    }

    pub fn successful_ticks(&self) -> u64 {
        self.successful_ticks.load(Ordering::Relaxed)
    }

    pub fn alert_triggered(&self) -> bool {
        self.alert_triggered.load(Ordering::Relaxed) == 1
    }

    pub fn last_notification(&self) -> Option<NotificationRecord> {
        self.last_notification.lock().ok().and_then(|n| n.clone())
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let (td_cur, td_avg, td_max, td_min) = self.tick_duration_seconds.snapshot();
        let (ua_cur, ua_avg, ua_max, ua_min) = self.user_average.snapshot();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "tick duration (s)",
            format!("{:.6}", td_cur),
            format!("{:.6}", td_avg),
            format!("{:.6}", td_max),
            format!("{:.6}", td_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "cpu.user windowed avg (%)",
            format!("{:.2}", ua_cur),
            format!("{:.2}", ua_avg),
            format!("{:.2}", ua_max),
            format!("{:.2}", ua_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "uptime (s): {}", self.get_uptime_seconds()).ok();
        writeln!(
            out,
            "ticks: {} total, {} ok, {} failed",
            self.total_ticks(),
            self.successful_ticks(),
            self.failed_ticks()
        )
        .ok();
        writeln!(
            out,
            "notifications: {} alerts, {} resolves (alert active: {})",
            self.alerts_sent.load(Ordering::Relaxed),
            self.resolves_sent.load(Ordering::Relaxed),
            if self.alert_triggered() { "yes" } else { "no" }
        )
        .ok();

        match self.last_notification() {
            Some(n) => writeln!(out, "last notification: {} {}", n.at.to_rfc3339(), n.text).ok(),
            None => writeln!(out, "last notification: never").ok(),
        };
        if let Some(err) = self.last_error.lock().ok().and_then(|e| e.clone()) {
            writeln!(out, "last tick error: {}", err).ok();
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat() {
        let mut s = RunningStat::default();
        assert_eq!(s.avg(), 0.0);
        s.add(2.0);
        s.add(6.0);
        s.add(4.0);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 6.0);
        assert_eq!(s.last, 4.0);
        assert!((s.avg() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_counters() {
        let stats = HealthStats::new();
        stats.record_tick(0.001, 12.0);
        stats.record_failed_tick("boom");
        stats.record_tick(0.002, 14.0);
        assert_eq!(stats.total_ticks(), 3);
        assert_eq!(stats.successful_ticks(), 2);
        assert_eq!(stats.failed_ticks(), 1);
        let table = stats.render_table();
        assert!(table.contains("ticks: 3 total, 2 ok, 1 failed"));
        assert!(table.contains("last tick error: boom"));
    }

    #[test]
    fn test_notification_tracking() {
        let stats = HealthStats::new();
        assert!(stats.render_table().contains("last notification: never"));
        stats.record_notification(true, "[ALERT]: x");
        assert!(stats.alert_triggered());
        stats.record_notification(false, "[RESOLVED]: x");
        assert!(!stats.alert_triggered());
        let last = stats.last_notification().unwrap();
        assert_eq!(last.text, "[RESOLVED]: x");
        assert!(stats
            .render_table()
            .contains("notifications: 1 alerts, 1 resolves (alert active: no)"));
    }
}
