//! RED signal bundle
//!
//! Four series sharing one window capacity: in-flight concurrency, call
//! latency in microseconds, an error indicator (0.0 success / 1.0 failure)
//! and admitted requests (1.0 per call).

use crate::series::TimeSeries;

#[derive(Debug)]
pub struct Metrics {
    pub(crate) concurrency: TimeSeries,
    pub(crate) latency: TimeSeries,
    pub(crate) errors: TimeSeries,
    pub(crate) requests: TimeSeries,
}

impl Metrics {
    pub fn new(size: u16) -> Self {
        Self {
            concurrency: TimeSeries::new(size),
            latency: TimeSeries::new(size),
            errors: TimeSeries::new(size),
            requests: TimeSeries::new(size),
        }
    }

    pub fn record_concurrency(&mut self, concurrency: f64, t_micros: f64) {
        self.concurrency.record(concurrency, t_micros);
    }

    pub fn record_latency(&mut self, latency: f64, t_micros: f64) {
        self.latency.record(latency, t_micros);
    }

    pub fn record_errors(&mut self, error: f64, t_micros: f64) {
        self.errors.record(error, t_micros);
    }

    pub fn record_requests(&mut self, requests: f64, t_micros: f64) {
        self.requests.record(requests, t_micros);
    }

    /// Reserved; always 0 for now.
    pub fn confidence_interval(&self) -> f64 {
        0.0
    }

    /// Clear the current batch of every series. EWMA history survives.
    pub fn reset(&mut self) {
        self.concurrency.reset_base();
        self.latency.reset_base();
        self.errors.reset_base();
        self.requests.reset_base();
    }
}
