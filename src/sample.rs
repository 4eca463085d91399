//! Ring-buffered exponential moving average.
//!
//! `RingAverage` keeps the last `capacity` raw samples next to a running EMA.
//! The EMA feeds the exported gauges; the windowed average over the ring is
//! what the alert decision compares against the threshold.

/// Fixed-capacity ring buffer with an attached exponential moving average.
#[derive(Debug, Clone)]
pub struct RingAverage {
    alpha: f64,
    ema: f64,
    values: Vec<f64>,
    position: usize,
    filled: bool,
}

impl RingAverage {
    /// Creates an empty ring. A capacity of zero is raised to one.
    pub fn new(alpha: f64, capacity: usize) -> Self {
        Self {
            alpha,
            ema: 0.0,
            values: vec![0.0; capacity.max(1)],
            position: 0,
            filled: false,
        }
    }

    /// Adds a sample to the ring and folds it into the EMA.
    pub fn add(&mut self, value: f64) {
        if self.position == 0 && !self.filled {
            self.ema = value;
        } else {
            self.ema = value * self.alpha + self.ema * (1.0 - self.alpha);
        }

        self.values[self.position] = value;
        self.position = (self.position + 1) % self.values.len();
        if self.position == 0 {
            self.filled = true;
        }
    }

    /// Average of overlapping half-length windows over the populated ring.
    ///
    /// With `n` populated slots, every window of `ceil(n/2)` consecutive
    /// samples starting at offsets `0..=floor(n/2)` is averaged, then the
    /// window averages are averaged again. Slots not yet written are ignored.
    pub fn windowed_average(&self) -> f64 {
        let len = if self.filled {
            self.values.len()
        } else {
            self.position
        };
        if len == 0 {
            return 0.0;
        }

        let window = len / 2 + len % 2;
        let last_offset = len / 2;
        let populated = &self.values[..len];

        let mut sum_of_windows = 0.0;
        let mut windows = 0usize;
        for offset in 0..=last_offset {
            let mut sum = 0.0;
            for i in 0..window {
                sum += populated[(offset + i) % len];
            }
            sum_of_windows += sum / window as f64;
            windows += 1;
        }

        sum_of_windows / windows as f64
    }

    /// Current EMA value.
    pub fn peek_ema(&self) -> f64 {
        self.ema
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Next slot to be overwritten.
    pub fn write_pos(&self) -> usize {
        self.position
    }

    /// True once the ring has wrapped at least once.
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// Raw ring slots in storage order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
