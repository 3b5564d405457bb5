use metrics::{counter, histogram};
use std::time::Instant;

use crate::errors::ErrorKind;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsService;

impl MetricsService {
    pub fn new() -> Self {
        Self
    }

    pub fn record_generation(&self, outcome: &'static str) {
        counter!("generations_total", "outcome" => outcome).increment(1);
    }

    pub fn record_generation_failure(&self, kind: ErrorKind) {
        counter!("generations_total", "outcome" => kind.as_str()).increment(1);
    }

    pub fn record_dispatch(&self, outcome: &'static str) {
        counter!("dispatches_total", "outcome" => outcome).increment(1);
    }

    pub fn record_logout(&self, reason: &'static str) {
        counter!("logouts_total", "reason" => reason).increment(1);
    }

    pub fn start_timer(&self, endpoint: impl Into<String>) -> RequestTimer {
        RequestTimer::new(endpoint.into())
    }
}

/// Records the elapsed time of an API call when dropped.
pub struct RequestTimer {
    start: Instant,
    endpoint: String,
}

impl RequestTimer {
    pub fn new(endpoint: String) -> Self {
        Self {
            start: Instant::now(),
            endpoint,
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        histogram!("api_request_duration_seconds", "endpoint" => self.endpoint.clone())
            .record(duration.as_secs_f64());
    }
}
