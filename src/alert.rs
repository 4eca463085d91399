//! Hysteresis gate for threshold alerts.
//!
//! A breach must be seen on three consecutive ticks before an alert fires,
//! and three consecutive clear ticks before a triggered alert resolves. Any
//! notification, in either direction, starts a cooldown during which no
//! further notification is emitted.

use std::time::{Duration, Instant};

/// Consecutive ticks required to flip the notification state.
pub const CONFIRMATION_TICKS: u8 = 3;

/// Notification produced by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertEvent {
    Alert { average: f64, threshold: f64 },
    Resolved,
}

impl AlertEvent {
    /// Message text sent to the notifier.
    pub fn message(&self, metric: &str) -> String {
        match self {
            AlertEvent::Alert { average, threshold } => format!(
                "[ALERT]: {} average utilization {:.6} is higher than {:.6}",
                metric, average, threshold
            ),
            AlertEvent::Resolved => {
                format!("[RESOLVED]: {} average utilization is within threshold", metric)
            }
        }
    }
}

/// Coarse view of the debouncer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    AlertRising,
    Triggered,
    ResolveRising,
}

#[derive(Debug, Clone)]
pub struct AlertDebouncer {
    threshold: f64,
    cooldown: Duration,
    alert_count: u8,
    resolve_count: u8,
    triggered: bool,
    last_notified_at: Option<Instant>,
}

impl AlertDebouncer {
    pub fn new(threshold: f64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            alert_count: 0,
            resolve_count: 0,
            triggered: false,
            last_notified_at: None,
        }
    }

    /// Feeds one tick's average and returns the notification to send, if any.
    ///
    /// A sustained breach re-alerts each time the cooldown expires. An emitted
    /// event counts toward the cooldown even if delivery later fails.
    pub fn observe(&mut self, average: f64, now: Instant) -> Option<AlertEvent> {
        if average >= self.threshold {
            self.alert_count = (self.alert_count + 1).min(CONFIRMATION_TICKS);
            self.resolve_count = 0;
        } else {
            self.resolve_count = (self.resolve_count + 1).min(CONFIRMATION_TICKS);
            self.alert_count = 0;
        }

        let cooled_down = match self.last_notified_at {
            Some(at) => now.saturating_duration_since(at) > self.cooldown,
            None => true,
        };

        if self.alert_count == CONFIRMATION_TICKS && cooled_down {
            self.triggered = true;
            self.last_notified_at = Some(now);
            Some(AlertEvent::Alert {
                average,
                threshold: self.threshold,
            })
        } else if self.triggered && self.resolve_count == CONFIRMATION_TICKS && cooled_down {
            self.triggered = false;
            self.last_notified_at = Some(now);
            Some(AlertEvent::Resolved)
        } else {
            None
        }
    }

    pub fn state(&self) -> DebounceState {
        if self.triggered && self.resolve_count > 0 && self.resolve_count < CONFIRMATION_TICKS {
            DebounceState::ResolveRising
        } else if self.triggered {
            DebounceState::Triggered
        } else if self.alert_count > 0 {
            DebounceState::AlertRising
        } else {
            DebounceState::Idle
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn alert_count(&self) -> u8 {
        self.alert_count
    }

    pub fn resolve_count(&self) -> u8 {
        self.resolve_count
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn last_notified_at(&self) -> Option<Instant> {
        self.last_notified_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    fn ticks(start: Instant, n: u64) -> impl Iterator<Item = Instant> {
        (0..n).map(move |i| start + Duration::from_secs(i))
    }

    #[test]
    fn test_alert_after_three_breaches() {
        let mut d = AlertDebouncer::new(80.0, COOLDOWN);
        let t = Instant::now();
        assert_eq!(d.observe(85.0, t), None);
        assert_eq!(d.state(), DebounceState::AlertRising);
        assert_eq!(d.observe(90.0, t + Duration::from_secs(1)), None);
        assert_eq!(
            d.observe(82.0, t + Duration::from_secs(2)),
            Some(AlertEvent::Alert {
                average: 82.0,
                threshold: 80.0
            })
        );
        assert!(d.is_triggered());
        assert_eq!(d.state(), DebounceState::Triggered);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut d = AlertDebouncer::new(80.0, COOLDOWN);
        let events: Vec<_> = ticks(Instant::now(), 3)
            .filter_map(|now| d.observe(80.0, now))
            .collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_interrupted_breach_resets_count() {
        let mut d = AlertDebouncer::new(80.0, COOLDOWN);
        let mut now = ticks(Instant::now(), 10);
        assert_eq!(d.observe(85.0, now.next().unwrap()), None);
        assert_eq!(d.observe(85.0, now.next().unwrap()), None);
        assert_eq!(d.observe(50.0, now.next().unwrap()), None);
        assert_eq!(d.alert_count(), 0);
        assert_eq!(d.resolve_count(), 1);
        assert_eq!(d.observe(85.0, now.next().unwrap()), None);
        assert_eq!(d.observe(85.0, now.next().unwrap()), None);
        assert!(!d.is_triggered());
    }

    #[test]
    fn test_counts_saturate_and_stay_exclusive() {
        let mut d = AlertDebouncer::new(80.0, COOLDOWN);
        for now in ticks(Instant::now(), 6) {
            d.observe(95.0, now);
            assert_eq!(d.resolve_count(), 0);
        }
        assert_eq!(d.alert_count(), CONFIRMATION_TICKS);
        d.observe(10.0, Instant::now() + Duration::from_secs(7));
        assert_eq!(d.alert_count(), 0);
        assert_eq!(d.resolve_count(), 1);
    }

    #[test]
    fn test_no_repeat_alert_within_cooldown() {
        let mut d = AlertDebouncer::new(80.0, COOLDOWN);
        let events: Vec<_> = ticks(Instant::now(), 20)
            .filter_map(|now| d.observe(99.0, now))
            .collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_sustained_breach_realerts_after_cooldown() {
        let mut d = AlertDebouncer::new(80.0, Duration::from_secs(10));
        // Ticks at 0..=30s: alert at t=2, again at t=13 and t=24.
        let events: Vec<_> = ticks(Instant::now(), 31)
            .filter_map(|now| d.observe(99.0, now))
            .collect();
        assert_eq!(events.len(), 3);
        assert!(d.is_triggered());
    }

    #[test]
    fn test_resolve_after_three_clear_ticks() {
        // threshold=80, rates 85,90,82 then 50,50,50
        let mut d = AlertDebouncer::new(80.0, Duration::ZERO);
        let start = Instant::now();
        let s = |i: u64| start + Duration::from_secs(i);
        assert_eq!(d.observe(85.0, s(1)), None);
        assert_eq!(d.observe(90.0, s(2)), None);
        assert!(matches!(d.observe(82.0, s(3)), Some(AlertEvent::Alert { .. })));
        assert_eq!(d.observe(50.0, s(4)), None);
        assert_eq!(d.resolve_count(), 1);
        assert_eq!(d.state(), DebounceState::ResolveRising);
        assert_eq!(d.observe(50.0, s(5)), None);
        assert_eq!(d.observe(50.0, s(6)), Some(AlertEvent::Resolved));
        assert!(!d.is_triggered());
        assert_eq!(d.state(), DebounceState::Idle);
    }

    #[test]
    fn test_resolve_requires_prior_trigger() {
        let mut d = AlertDebouncer::new(80.0, Duration::ZERO);
        let events: Vec<_> = ticks(Instant::now(), 5)
            .filter_map(|now| d.observe(10.0, now))
            .collect();
        assert!(events.is_empty());
    }

    #[test]
    fn test_cooldown_delays_resolve() {
        let mut d = AlertDebouncer::new(80.0, COOLDOWN);
        let start = Instant::now();
        let s = |i: u64| start + Duration::from_secs(i);
        for i in 0..3 {
            d.observe(90.0, s(i));
        }
        assert!(d.is_triggered());
        // Three clear ticks, but still inside the cooldown window.
        for i in 3..10 {
            assert_eq!(d.observe(10.0, s(i)), None);
        }
        assert!(d.is_triggered());
        // Exactly at the cooldown boundary is not enough.
        assert_eq!(d.observe(10.0, s(2 + 60)), None);
        assert_eq!(d.observe(10.0, s(2 + 61)), Some(AlertEvent::Resolved));
    }

    #[test]
    fn test_cooldown_delays_realert() {
        let mut d = AlertDebouncer::new(80.0, COOLDOWN);
        let start = Instant::now();
        let s = |i: u64| start + Duration::from_secs(i);
        for i in 0..3 {
            d.observe(90.0, s(i));
        }
        for i in 100..103 {
            d.observe(10.0, s(i));
        }
        assert!(!d.is_triggered());
        // Resolved at t=102; breaches right after stay quiet until cooldown passes.
        for i in 103..106 {
            assert_eq!(d.observe(90.0, s(i)), None);
        }
        assert!(d.observe(90.0, s(163)).is_some());
    }

    #[test]
    fn test_message_format() {
        let alert = AlertEvent::Alert {
            average: 85.5,
            threshold: 80.0,
        };
        assert_eq!(
            alert.message("cpu.user"),
            "[ALERT]: cpu.user average utilization 85.500000 is higher than 80.000000"
        );
        assert_eq!(
            AlertEvent::Resolved.message("cpu.user"),
            "[RESOLVED]: cpu.user average utilization is within threshold"
        );
    }
}
