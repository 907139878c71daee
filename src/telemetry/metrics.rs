//! Metric instrument factories for workq-dispatch.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"workq-dispatch"` meter.
//! Without a configured provider the global no-op meter is used, so
//! recording is always safe.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE,
};

use crate::config::Mode;

/// Returns the shared meter for workq-dispatch instruments.
fn meter() -> Meter {
    opentelemetry::global::meter(super::SERVICE_NAME)
}

/// Counter: outbound requests to the worker cluster.
/// Labels: `http.request.method`, `result` ("ok" | "status" | "transport").
pub fn requests() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.requests")
        .with_description("Number of requests sent to the worker cluster")
        .build()
}

/// Counter: jobs delivered to the outbox.
/// Labels: `result` ("ok" | "failed").
pub fn jobs_completed() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.jobs.completed")
        .with_description("Number of jobs delivered to the outbox")
        .build()
}

/// Counter: jobs dropped because cancellation fired during delivery.
pub fn jobs_dropped() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.jobs.dropped")
        .with_description("Number of jobs dropped by cancellation")
        .build()
}

/// Histogram: request round-trip duration in milliseconds.
/// Labels: `http.request.method`, `http.response.status_code` (when known).
pub fn request_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("dispatch.request.duration_ms")
        .with_description("Worker cluster request duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Label set for a finished request.
pub fn request_labels(mode: Mode, status: Option<u16>) -> Vec<KeyValue> {
    let method = match mode {
        Mode::Single => "GET",
        Mode::Batch => "POST",
    };
    let mut labels = vec![KeyValue::new(HTTP_REQUEST_METHOD, method)];
    if let Some(status) = status {
        labels.push(KeyValue::new(HTTP_RESPONSE_STATUS_CODE, i64::from(status)));
    }
    labels
}

/// Instruments used by one dispatcher, built once at start.
#[derive(Clone)]
pub struct DispatchMetrics {
    requests: Counter<u64>,
    request_duration_ms: Histogram<f64>,
    jobs_completed: Counter<u64>,
    jobs_dropped: Counter<u64>,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            requests: requests(),
            request_duration_ms: request_duration_ms(),
            jobs_completed: jobs_completed(),
            jobs_dropped: jobs_dropped(),
        }
    }

    pub fn record_request(&self, mode: Mode, status: Option<u16>, duration_ms: f64) {
        let result = match status {
            Some(200) => "ok",
            Some(_) => "status",
            None => "transport",
        };
        let mut labels = request_labels(mode, None);
        labels.push(KeyValue::new("result", result));
        self.requests.add(1, &labels);
        self.request_duration_ms.record(duration_ms, &request_labels(mode, status));
    }

    pub fn record_completed(&self, succeeded: bool) {
        let result = if succeeded { "ok" } else { "failed" };
        self.jobs_completed.add(1, &[KeyValue::new("result", result)]);
    }

    pub fn record_dropped(&self) {
        self.jobs_dropped.add(1, &[]);
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}
