//! Dispatch span helpers.
//!
//! One span per outbound request, carrying the mode, the execution unit
//! and the number of jobs in the request. The response status is recorded
//! once it is known.

use tracing::Span;
use uuid::Uuid;

use crate::config::Mode;

/// Start a span for one request to the worker cluster.
///
/// The `http.status` field is declared empty and can be filled via
/// [`record_status`].
pub fn start_request_span(mode: Mode, unit: usize, jobs: usize) -> Span {
    tracing::debug_span!(
        "dispatch.request",
        "dispatch.request_id" = %Uuid::new_v4(),
        "dispatch.mode" = mode.as_str(),
        "dispatch.unit" = unit,
        "dispatch.jobs" = jobs,
        "http.status" = tracing::field::Empty,
    )
}

/// Record the HTTP response status on a request span.
pub fn record_status(span: &Span, status: u16) {
    span.record("http.status", status);
}
