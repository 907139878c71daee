//! The job capability contract.
//!
//! A job is one unit of work and, after dispatch, its result. The engine is
//! generic over [`Job`] and only ever asks a job for its request key, hands
//! it a decoded response, and reads back a success flag.

use serde::{Deserialize, Serialize};

/// Capability contract every dispatched job satisfies.
pub trait Job: Send + 'static {
    /// Request key: a hostname, URL or other opaque string.
    fn identifier(&self) -> &str;

    /// Restore job state from one decoded server response.
    ///
    /// Called at most once, and only for a 200 response. On error the job
    /// is expected to still report `succeeded() == false`.
    fn materialize(&mut self, raw: serde_json::Value) -> Result<(), serde_json::Error>;

    /// Whether the job's current state is a successful outcome.
    fn succeeded(&self) -> bool;
}

/// An ordered group of jobs sent in one request.
///
/// Response element *i* belongs to batch element *i*.
pub type Batch<J> = Vec<J>;

/// Status of a job that never received a response.
pub const STATUS_UNANSWERED: i64 = -1;

/// A job whose result is kept as raw JSON.
///
/// Follows the worker cluster's convention: the response carries a
/// `status` field that is `0` (or absent) on success and non-zero on
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJob {
    pub request: String,
    pub status: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl RawJob {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            status: STATUS_UNANSWERED,
            response: None,
        }
    }
}

impl Job for RawJob {
    fn identifier(&self) -> &str {
        &self.request
    }

    fn materialize(&mut self, raw: serde_json::Value) -> Result<(), serde_json::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            status: i64,
        }

        let envelope: Envelope = serde_json::from_value(raw.clone())?;
        self.status = envelope.status;
        self.response = Some(raw);
        Ok(())
    }

    fn succeeded(&self) -> bool {
        self.status == 0
    }
}
