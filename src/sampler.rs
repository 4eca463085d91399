//! CPU sampling loop and the reporter that reads its averages.
//!
//! One mutex guards the snapshot pair and every `RingAverage`. The sampler
//! holds it while reading counters and updating all averages for a tick, so a
//! reporter never sees a partially applied tick. Notifications are sent after
//! the lock is released.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::alert::{AlertDebouncer, AlertEvent};
use crate::error::SampleError;
use crate::health_stats::HealthStats;
use crate::metrics::HostMetrics;
use crate::notifier::Notifier;
use crate::sample::RingAverage;
use crate::system::{rate, CounterSource, CpuCategory, CpuSnapshot};

/// Largest cpu.user window, one day of one-second samples.
pub const MAX_WINDOW_SAMPLES: usize = 86_400;

/// Engine parameters derived from the effective configuration.
#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub threshold: f64,
    pub sample_rate: Duration,
    pub reporting_interval: Duration,
    pub cooldown: Duration,
    pub hostname: String,
}

impl SamplerSettings {
    /// EMA smoothing factor: sample rate over reporting interval.
    pub fn alpha(&self) -> f64 {
        let interval = self.reporting_interval.as_secs_f64();
        if interval <= 0.0 {
            return 1.0;
        }
        (self.sample_rate.as_secs_f64() / interval).clamp(f64::MIN_POSITIVE, 1.0)
    }

    /// Samples per reporting interval, unclamped.
    pub fn window_samples(&self) -> f64 {
        let rate = self.sample_rate.as_secs_f64();
        if rate <= 0.0 {
            return 1.0;
        }
        (self.reporting_interval.as_secs_f64() / rate).round()
    }

    /// Samples retained per reporting interval, within `1..=MAX_WINDOW_SAMPLES`.
    pub fn capacity(&self) -> usize {
        let samples = self.window_samples();
        if samples >= MAX_WINDOW_SAMPLES as f64 {
            return MAX_WINDOW_SAMPLES;
        }
        (samples as usize).max(1)
    }
}

/// EMA values of the tracked categories, as of the last completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuEmaValues {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
}

impl CpuEmaValues {
    /// EMA of a tracked category; `None` for untracked ones.
    pub fn get(&self, category: CpuCategory) -> Option<f64> {
        match category {
            CpuCategory::User => Some(self.user),
            CpuCategory::System => Some(self.system),
            CpuCategory::Idle => Some(self.idle),
            CpuCategory::Nice => None,
        }
    }
}

/// State shared between the sampler and reporters.
#[derive(Debug)]
pub struct SamplerState {
    previous: Option<CpuSnapshot>,
    current: Option<CpuSnapshot>,
    /// Indexed by `CpuCategory::index()` for the tracked categories.
    averages: [RingAverage; 3],
}

impl SamplerState {
    fn new(settings: &SamplerSettings) -> Self {
        let alpha = settings.alpha();
        Self {
            previous: None,
            current: None,
            // Only cpu.user feeds the alert, the others keep a single slot.
            averages: [
                RingAverage::new(alpha, settings.capacity()),
                RingAverage::new(alpha, 1),
                RingAverage::new(alpha, 1),
            ],
        }
    }

    /// Forgets both snapshots; averages keep their history.
    pub fn clear(&mut self) {
        self.previous = None;
        self.current = None;
    }

    pub fn previous(&self) -> Option<&CpuSnapshot> {
        self.previous.as_ref()
    }

    pub fn current(&self) -> Option<&CpuSnapshot> {
        self.current.as_ref()
    }

    pub fn average(&self, category: CpuCategory) -> Option<&RingAverage> {
        match category {
            CpuCategory::Nice => None,
            c => self.averages.get(c.index()),
        }
    }

    pub fn rate(&self, category: CpuCategory) -> f64 {
        rate(category, self.previous.as_ref(), self.current.as_ref())
    }

    fn ema_values(&self) -> CpuEmaValues {
        CpuEmaValues {
            user: self.averages[CpuCategory::User.index()].peek_ema(),
            system: self.averages[CpuCategory::System.index()].peek_ema(),
            idle: self.averages[CpuCategory::Idle.index()].peek_ema(),
        }
    }
}

/// Rotates the snapshot pair and stores a fresh reading.
fn collect<S: CounterSource>(source: &mut S, state: &mut SamplerState) -> Result<(), SampleError> {
    state.previous = state.current.take();
    state.current = Some(source.read()?);
    Ok(())
}

/// Result of one successful tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Rates for user, system, idle in that order.
    pub rates: [f64; 3],
    /// Windowed cpu.user average compared against the threshold.
    pub average: f64,
    pub event: Option<AlertEvent>,
}

pub struct CpuSampler<S> {
    source: S,
    state: Arc<Mutex<SamplerState>>,
    debouncer: AlertDebouncer,
    settings: SamplerSettings,
}

impl<S: CounterSource> CpuSampler<S> {
    pub fn new(settings: SamplerSettings, source: S) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(SamplerState::new(&settings))),
            debouncer: AlertDebouncer::new(settings.threshold, settings.cooldown),
            settings,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SamplerState>, SampleError> {
        self.state.lock().map_err(|_| SampleError::Poisoned)
    }

    /// Takes an initial reading so the first tick already has a delta.
    pub fn prime(&mut self) -> Result<(), SampleError> {
        let mut state = self.state.lock().map_err(|_| SampleError::Poisoned)?;
        if let Err(e) = collect(&mut self.source, &mut state) {
            state.clear();
            return Err(e);
        }
        Ok(())
    }

    /// Runs one sampling step.
    ///
    /// A counter read failure clears the snapshot pair and aborts the tick
    /// before any average or alert state changes.
    #[instrument(level = "trace", skip(self))]
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, SampleError> {
        let (rates, average) = {
            let mut state = self.state.lock().map_err(|_| SampleError::Poisoned)?;
            if let Err(e) = collect(&mut self.source, &mut state) {
                state.clear();
                return Err(e);
            }

            let mut rates = [0.0; 3];
            for category in CpuCategory::TRACKED {
                let r = state.rate(category);
                state.averages[category.index()].add(r);
                rates[category.index()] = r;
            }
            let average = state.averages[CpuCategory::User.index()].windowed_average();
            (rates, average)
        };

        let event = self.debouncer.observe(average, now);
        Ok(TickOutcome {
            rates,
            average,
            event,
        })
    }

    pub fn reporter(&self) -> CpuReporter {
        CpuReporter {
            state: Arc::clone(&self.state),
        }
    }

    pub fn debouncer(&self) -> &AlertDebouncer {
        &self.debouncer
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Read access to the shared state, for diagnostics.
    pub fn with_state<R>(&self, f: impl FnOnce(&SamplerState) -> R) -> Result<R, SampleError> {
        let state = self.lock()?;
        Ok(f(&state))
    }
}

/// Sends a tick's event through the notifier and records it.
async fn dispatch<N: Notifier>(
    notifier: &N,
    hostname: &str,
    event: AlertEvent,
    health: &HealthStats,
) {
    let text = event.message(CpuCategory::User.metric_name());
    match event {
        AlertEvent::Alert { .. } => warn!("{}", text),
        AlertEvent::Resolved => info!("{}", text),
    }
    health.record_notification(matches!(event, AlertEvent::Alert { .. }), &text);
    notifier.notify(hostname, &text).await;
}

/// Drives the sampler on its fixed period until the task is aborted.
pub async fn run<S, N>(mut sampler: CpuSampler<S>, notifier: N, health: Arc<HealthStats>)
where
    S: CounterSource + 'static,
    N: Notifier,
{
    let period = sampler.settings.sample_rate;
    let hostname = sampler.settings.hostname.clone();

    if let Err(e) = sampler.prime() {
        error!("Initial CPU counter read failed: {}", e);
    }

    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(
        "CPU sampler started: period {:?}, alpha {:.4}, capacity {}",
        period,
        sampler.settings.alpha(),
        sampler.settings.capacity()
    );

    loop {
        ticker.tick().await;
        let now = tokio::time::Instant::now().into_std();
        let start = Instant::now();

        match sampler.tick(now) {
            Ok(outcome) => {
                debug!(
                    "Tick: user {:.2}% system {:.2}% idle {:.2}% (windowed user avg {:.2}%)",
                    outcome.rates[0], outcome.rates[1], outcome.rates[2], outcome.average
                );
                health.record_tick(start.elapsed().as_secs_f64(), outcome.average);
                if let Some(event) = outcome.event {
                    dispatch(&notifier, &hostname, event, &health).await;
                }
            }
            Err(e) => {
                error!("CPU sampling tick failed, snapshot state cleared: {}", e);
                health.record_failed_tick(&e.to_string());
            }
        }
    }
}

/// Read-only view of the EMA values for the metrics sink.
#[derive(Clone)]
pub struct CpuReporter {
    state: Arc<Mutex<SamplerState>>,
}

impl CpuReporter {
    /// EMA values as of the last completed tick.
    pub fn ema_values(&self) -> CpuEmaValues {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.ema_values()
    }

    /// Pushes the current EMA values into the CPU gauges.
    pub fn fill(&self, metrics: &HostMetrics) {
        let values = self.ema_values();
        for category in CpuCategory::TRACKED {
            if let (Some(gauge), Some(value)) = (metrics.cpu_gauge(category), values.get(category)) {
                gauge.set(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::LogNotifier;
    use prometheus::Registry;
    use std::collections::VecDeque;

    /// Replays scripted readings; `None` simulates a read failure.
    struct ScriptedSource {
        readings: VecDeque<Option<CpuSnapshot>>,
    }

    impl ScriptedSource {
        fn new(readings: Vec<Option<CpuSnapshot>>) -> Self {
            Self {
                readings: readings.into(),
            }
        }
    }

    impl CounterSource for ScriptedSource {
        fn read(&mut self) -> Result<CpuSnapshot, SampleError> {
            match self.readings.pop_front() {
                Some(Some(snap)) => Ok(snap),
                _ => Err(SampleError::MissingCpuLine),
            }
        }
    }

    fn settings(threshold: f64, capacity: u64) -> SamplerSettings {
        SamplerSettings {
            threshold,
            sample_rate: Duration::from_secs(1),
            reporting_interval: Duration::from_secs(capacity),
            cooldown: Duration::ZERO,
            hostname: "test-host".to_string(),
        }
    }

    /// Snapshots whose successive deltas yield the given user percentages
    /// out of 100 ticks each.
    fn readings_for(user_rates: &[u64]) -> Vec<Option<CpuSnapshot>> {
        let mut user = 0;
        let mut idle = 0;
        let mut out = vec![Some(CpuSnapshot::new(0, 0, 0, 0))];
        for r in user_rates {
            user += r;
            idle += 100 - r;
            out.push(Some(CpuSnapshot::new(user, 0, idle, 0)));
        }
        out
    }

    #[test]
    fn test_settings_derivation() {
        let s = SamplerSettings {
            threshold: 80.0,
            sample_rate: Duration::from_millis(500),
            reporting_interval: Duration::from_secs(10),
            cooldown: Duration::from_secs(60),
            hostname: "h".into(),
        };
        assert!((s.alpha() - 0.05).abs() < 1e-12);
        assert_eq!(s.capacity(), 20);

        let s = SamplerSettings {
            sample_rate: Duration::from_secs(3),
            reporting_interval: Duration::from_secs(10),
            ..s
        };
        assert_eq!(s.capacity(), 3);
    }

    #[test]
    fn test_capacity_is_clamped_to_max_window() {
        let s = SamplerSettings {
            threshold: 80.0,
            sample_rate: Duration::from_millis(1),
            reporting_interval: Duration::from_secs(u64::MAX / 2),
            cooldown: Duration::from_secs(60),
            hostname: "h".into(),
        };
        assert_eq!(s.capacity(), MAX_WINDOW_SAMPLES);

        let sampler = CpuSampler::new(s, ScriptedSource::new(Vec::new()));
        let capacity = sampler
            .with_state(|st| st.average(CpuCategory::User).unwrap().capacity())
            .unwrap();
        assert_eq!(capacity, MAX_WINDOW_SAMPLES);
    }

    #[test]
    fn test_ema_values_only_cover_tracked_categories() {
        let values = CpuEmaValues {
            user: 12.0,
            system: 3.0,
            idle: 85.0,
        };
        assert_eq!(values.get(CpuCategory::User), Some(12.0));
        assert_eq!(values.get(CpuCategory::System), Some(3.0));
        assert_eq!(values.get(CpuCategory::Idle), Some(85.0));
        assert_eq!(values.get(CpuCategory::Nice), None);
    }

    #[test]
    fn test_first_tick_without_previous_yields_zero() {
        let source = ScriptedSource::new(vec![Some(CpuSnapshot::new(500, 100, 900, 0))]);
        let mut sampler = CpuSampler::new(settings(80.0, 4), source);
        let outcome = sampler.tick(Instant::now()).unwrap();
        assert_eq!(outcome.rates, [0.0, 0.0, 0.0]);
        assert_eq!(outcome.average, 0.0);
        assert_eq!(outcome.event, None);
    }

    #[test]
    fn test_alert_then_resolve_scenario() {
        let source = ScriptedSource::new(readings_for(&[85, 90, 82, 50, 50, 50]));
        // capacity 1 so the windowed average is the latest rate
        let mut sampler = CpuSampler::new(settings(80.0, 1), source);
        sampler.prime().unwrap();

        let start = Instant::now();
        let mut events = Vec::new();
        for i in 0..6 {
            let outcome = sampler.tick(start + Duration::from_secs(i)).unwrap();
            events.push(outcome.event);
        }

        assert_eq!(events[0], None);
        assert_eq!(events[1], None);
        match events[2] {
            Some(AlertEvent::Alert { average, threshold }) => {
                assert!((average - 82.0).abs() < 1e-9);
                assert_eq!(threshold, 80.0);
            }
            other => panic!("expected alert on third tick, got {:?}", other),
        }
        assert_eq!(events[3], None);
        assert_eq!(events[4], None);
        assert_eq!(events[5], Some(AlertEvent::Resolved));
    }

    #[test]
    fn test_read_failure_clears_snapshots_but_keeps_history() {
        let mut readings = readings_for(&[40, 60]);
        readings.push(None);
        readings.push(Some(CpuSnapshot::new(10_000, 0, 10_000, 0)));
        let mut sampler = CpuSampler::new(settings(80.0, 4), ScriptedSource::new(readings));
        sampler.prime().unwrap();

        let now = Instant::now();
        sampler.tick(now).unwrap();
        sampler.tick(now).unwrap();
        let ema_before = sampler.reporter().ema_values();
        let ring_pos = sampler
            .with_state(|s| s.average(CpuCategory::User).unwrap().write_pos())
            .unwrap();

        assert!(sampler.tick(now).is_err());
        sampler
            .with_state(|s| {
                assert!(s.previous().is_none());
                assert!(s.current().is_none());
                assert_eq!(s.average(CpuCategory::User).unwrap().write_pos(), ring_pos);
            })
            .unwrap();
        assert_eq!(sampler.reporter().ema_values(), ema_before);
        assert_eq!(sampler.debouncer().alert_count(), 0);

        // Recovery tick has no previous snapshot, so no stale delta is computed.
        let outcome = sampler.tick(now).unwrap();
        assert_eq!(outcome.rates, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_prime_failure_leaves_state_empty() {
        let mut sampler = CpuSampler::new(settings(80.0, 4), ScriptedSource::new(vec![None]));
        assert!(sampler.prime().is_err());
        sampler
            .with_state(|s| assert!(s.current().is_none()))
            .unwrap();
    }

    #[test]
    fn test_reporter_fills_ema_gauges() {
        let source = ScriptedSource::new(readings_for(&[30, 50]));
        let mut sampler = CpuSampler::new(settings(80.0, 10), source);
        sampler.prime().unwrap();
        let now = Instant::now();
        sampler.tick(now).unwrap();
        sampler.tick(now).unwrap();

        let registry = Registry::new();
        let metrics = HostMetrics::new(&registry).unwrap();
        sampler.reporter().fill(&metrics);

        // alpha = 0.1: 30 then 50*0.1 + 30*0.9
        assert!((metrics.cpu_user.get() - 32.0).abs() < 1e-9);
        assert!((metrics.cpu_idle.get() - 68.0).abs() < 1e-9);
        assert_eq!(metrics.cpu_system.get(), 0.0);
    }

    #[test]
    fn test_windowed_average_feeds_alert() {
        // A single spike in a 4-slot window must not trip an 80% threshold.
        let source = ScriptedSource::new(readings_for(&[10, 10, 100, 10, 10]));
        let mut sampler = CpuSampler::new(settings(80.0, 4), source);
        sampler.prime().unwrap();
        let now = Instant::now();
        for _ in 0..5 {
            let outcome = sampler.tick(now).unwrap();
            assert!(outcome.average < 80.0);
            assert_eq!(outcome.event, None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_samples_on_period() {
        let source = ScriptedSource::new(readings_for(&[90, 90, 90, 90]));
        let sampler = CpuSampler::new(settings(80.0, 1), source);
        let reporter = sampler.reporter();
        let health = Arc::new(HealthStats::new());

        let task = tokio::spawn(run(sampler, LogNotifier, Arc::clone(&health)));
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(health.total_ticks(), 3);
        assert_eq!(health.failed_ticks(), 0);
        assert!(health.alert_triggered());
        assert!((reporter.ema_values().user - 90.0).abs() < 1e-9);

        // Scripted readings are exhausted after the fourth tick.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(health.failed_ticks(), 1);

        task.abort();
    }
}
