//! Windowed time-series statistics
//!
//! Each observed signal is tracked by a [`TimeSeries`]: a fixed-capacity
//! buffer of samples plus running aggregates. When the buffer fills, the
//! batch statistics (mean, p99, absolute deviation, least-squares slope)
//! are folded into three exponentially weighted moving averages and the
//! batch starts over. Memory per series is fixed at construction.

/// Smoothing horizons, in batches. When the window holds roughly one second
/// of traffic these work out to about five minutes and one day.
const EXT_LO: f64 = 300.0;
const EXT_HI: f64 = 90_000.0;

/// Floor for the current-batch weight denominator in the blended mean.
const BLEND_EPSILON: f64 = 1e-9;

/// One smoothed statistic at three horizons
///
/// `base` is the latest batch value; `mid` and `long` are updated in place
/// by `x ← (1-α)·x + α·new`. A triple is born on the first flush with all
/// three members equal to the flushed statistic.
#[derive(Debug, Clone, Copy)]
struct Ewma {
    base: f64,
    mid: f64,
    long: f64,
}

impl Ewma {
    fn seed(x: f64) -> Self {
        Self {
            base: x,
            mid: x,
            long: x,
        }
    }

    fn update(&mut self, x: f64, alpha_mid: f64, alpha_long: f64) {
        self.base = x;
        self.mid = (1.0 - alpha_mid) * self.mid + alpha_mid * x;
        self.long = (1.0 - alpha_long) * self.long + alpha_long * x;
    }
}

fn fold(slot: &mut Option<Ewma>, x: f64, alpha_mid: f64, alpha_long: f64) {
    match slot {
        Some(ewma) => ewma.update(x, alpha_mid, alpha_long),
        None => *slot = Some(Ewma::seed(x)),
    }
}

/// Fixed-capacity sample window with batch-flushed EWMA triples
#[derive(Debug)]
pub struct TimeSeries {
    values: Vec<f64>,
    scratch: Vec<f64>,

    mean: f64,
    sum_abs_dev: f64,
    sum_vt: f64,
    sum_tt: f64,
    delta_t: f64,

    value: Option<Ewma>,
    p99: Option<Ewma>,
    deviation: Option<Ewma>,
    derivative: Option<Ewma>,

    size: u16,
}

impl TimeSeries {
    /// Create a series with a window of `size` samples.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    pub fn new(size: u16) -> Self {
        assert!(size > 0, "window capacity must be greater than 0");
        Self {
            values: Vec::with_capacity(usize::from(size)),
            scratch: Vec::with_capacity(usize::from(size)),
            mean: 0.0,
            sum_abs_dev: 0.0,
            sum_vt: 0.0,
            sum_tt: 0.0,
            delta_t: 0.0,
            value: None,
            p99: None,
            deviation: None,
            derivative: None,
            size,
        }
    }

    /// Append a sample observed at `t_micros` (microseconds on any fixed
    /// monotonic origin). The first sample of a batch becomes the batch's
    /// time origin. Filling the window flushes the batch into the EWMAs.
    pub fn record(&mut self, value: f64, t_micros: f64) {
        if self.values.is_empty() {
            self.delta_t = t_micros;
        }

        self.values.push(value);
        let n = self.values.len() as f64;
        self.mean += (value - self.mean) / n;
        // Signed residual against the already-updated mean; near zero for
        // symmetric data. Anomaly checks compare relative spikes only.
        self.sum_abs_dev += value - self.mean;

        let normalized_t = t_micros - self.delta_t;
        self.sum_vt += value * normalized_t;
        self.sum_tt += normalized_t * normalized_t;

        if self.values.len() == usize::from(self.size) {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let n = self.values.len() as f64;
        let alpha_mid = 1.0 / (f64::from(self.size) * EXT_LO);
        let alpha_long = 1.0 / (f64::from(self.size) * EXT_HI);

        self.scratch.clear();
        self.scratch.extend_from_slice(&self.values);
        self.scratch.sort_unstable_by(|a, b| a.total_cmp(b));
        let p99 = self.scratch[(n * 0.99) as usize];

        let batch_mean = self.mean;
        let batch_deviation = self.sum_abs_dev / n;
        let batch_derivative = self.derivative();

        fold(&mut self.value, batch_mean, alpha_mid, alpha_long);
        fold(&mut self.p99, p99, alpha_mid, alpha_long);
        fold(&mut self.deviation, batch_deviation, alpha_mid, alpha_long);
        fold(&mut self.derivative, batch_derivative, alpha_mid, alpha_long);

        // The running aggregates are per-batch; the next batch starts clean.
        self.values.clear();
        self.mean = 0.0;
        self.sum_abs_dev = 0.0;
        self.sum_vt = 0.0;
        self.sum_tt = 0.0;
        self.delta_t = 0.0;
    }

    /// Clear the current batch. EWMA history survives.
    pub fn reset_base(&mut self) {
        self.values.clear();
        self.mean = 0.0;
        self.sum_abs_dev = 0.0;
        self.sum_vt = 0.0;
        self.sum_tt = 0.0;
        self.delta_t = 0.0;
    }

    /// Fraction of the window the current batch fills
    pub fn fill_rate(&self) -> f64 {
        self.values.len() as f64 / f64::from(self.size)
    }

    /// Window capacity
    pub fn capacity(&self) -> u16 {
        self.size
    }

    /// Least-squares slope of the current batch, through the batch origin
    pub fn derivative(&self) -> f64 {
        if self.sum_tt > 0.0 {
            self.sum_vt / self.sum_tt
        } else {
            0.0
        }
    }

    /// Signed mean deviation of the current batch
    pub fn deviation(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum_abs_dev / self.values.len() as f64
    }

    /// Best-guess mean: the historical batch mean blended with the current
    /// batch, weighting the current batch by how tight its samples are.
    pub fn mean(&self) -> f64 {
        let n = self.values.len() as f64;
        if self.values.is_empty() {
            return self.value.map_or(0.0, |e| e.base);
        }
        let Some(history) = self.value else {
            return self.mean;
        };

        let historical_weight = f64::from(self.size);
        let current_weight = n * n / (self.sum_abs_dev + BLEND_EPSILON);
        (historical_weight * history.base + current_weight * self.mean)
            / (historical_weight + current_weight)
    }

    pub fn mean_base(&self) -> f64 {
        self.value.map_or(0.0, |e| e.base)
    }

    pub fn mean_mid(&self) -> f64 {
        self.value.map_or(0.0, |e| e.mid)
    }

    pub fn mean_long(&self) -> f64 {
        self.value.map_or(0.0, |e| e.long)
    }

    pub fn p99_base(&self) -> f64 {
        self.p99.map_or(0.0, |e| e.base)
    }

    pub fn p99_mid(&self) -> f64 {
        self.p99.map_or(0.0, |e| e.mid)
    }

    pub fn p99_long(&self) -> f64 {
        self.p99.map_or(0.0, |e| e.long)
    }

    pub fn deviation_base(&self) -> f64 {
        self.deviation.map_or(0.0, |e| e.base)
    }

    pub fn deviation_mid(&self) -> f64 {
        self.deviation.map_or(0.0, |e| e.mid)
    }

    pub fn deviation_long(&self) -> f64 {
        self.deviation.map_or(0.0, |e| e.long)
    }

    pub fn derivative_base(&self) -> f64 {
        self.derivative.map_or(0.0, |e| e.base)
    }

    pub fn derivative_mid(&self) -> f64 {
        self.derivative.map_or(0.0, |e| e.mid)
    }

    pub fn derivative_long(&self) -> f64 {
        self.derivative.map_or(0.0, |e| e.long)
    }
}
