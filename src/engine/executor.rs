//! Request/response executor.
//!
//! Builds the outbound request for one job (GET) or one ordered batch
//! (POST), sends it once, and decodes a 200 response back into the job(s).
//! Nothing here returns an error for a single job: transport failures,
//! non-200 statuses and undecodable bodies are logged and leave the jobs
//! as they were.

use crate::auth::SignRequest;
use crate::config::{Mode, ResolvedConfig};
use crate::error::Result;
use crate::job::Job;
use crate::telemetry::dispatch::{record_status, start_request_span};
use crate::telemetry::metrics::DispatchMetrics;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Span, debug, warn};

use super::pacer::Pacer;

/// How a single request/response cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// The cluster answered 200.
    Accepted,
    /// The cluster answered with another status.
    Rejected(u16),
    /// No response: connection, timeout or other transport error.
    Unreachable,
}

impl Cycle {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Cycle::Accepted)
    }
}

/// Shared by all execution units; cheap to clone.
#[derive(Clone)]
pub struct Executor {
    client: reqwest::Client,
    config: Arc<ResolvedConfig>,
    signer: Arc<dyn SignRequest>,
    pacer: Arc<Pacer>,
    metrics: DispatchMetrics,
}

impl Executor {
    /// Build an executor with its own HTTP client using the configured timeout.
    pub fn new(
        config: Arc<ResolvedConfig>,
        signer: Arc<dyn SignRequest>,
        pacer: Arc<Pacer>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, config, signer, pacer))
    }

    /// Build an executor around an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        config: Arc<ResolvedConfig>,
        signer: Arc<dyn SignRequest>,
        pacer: Arc<Pacer>,
    ) -> Self {
        Self {
            client,
            config,
            signer,
            pacer,
            metrics: DispatchMetrics::new(),
        }
    }

    /// `GET {base}/{identifier}{params}`, decoding a JSON object into `job`.
    pub async fn get<J: Job>(&self, unit: usize, job: &mut J) -> Cycle {
        let span = start_request_span(Mode::Single, unit, 1);
        async {
            let url = self.config.get_url(job.identifier());
            let request = self.client.get(url);
            let response = match self.send(Mode::Single, request, &span).await {
                Ok(response) => response,
                Err(cycle) => return cycle,
            };

            match response.json::<serde_json::Value>().await {
                Ok(raw) => {
                    if let Err(e) = job.materialize(raw) {
                        warn!(identifier = job.identifier(), error = %e, "cannot materialize job");
                    }
                }
                Err(e) => warn!(identifier = job.identifier(), error = %e, "cannot decode response"),
            }

            self.pacer.wait().await;
            Cycle::Accepted
        }
        .instrument(span.clone())
        .await
    }

    /// `POST {base}{params}` with one identifier per line. Response element
    /// *i* is decoded into `batch[i]`.
    ///
    /// A response array whose length differs from the batch is not trusted:
    /// the whole batch is left unmaterialized.
    pub async fn post<J: Job>(&self, unit: usize, batch: &mut [J]) -> Cycle {
        let span = start_request_span(Mode::Batch, unit, batch.len());
        async {
            let request = self
                .client
                .post(self.config.post_url())
                .header(CONTENT_TYPE, "text/plain")
                .body(batch_body(batch));
            let response = match self.send(Mode::Batch, request, &span).await {
                Ok(response) => response,
                Err(cycle) => return cycle,
            };

            match response.json::<Vec<serde_json::Value>>().await {
                Ok(raw) if raw.len() == batch.len() => {
                    for (job, raw) in batch.iter_mut().zip(raw) {
                        if let Err(e) = job.materialize(raw) {
                            warn!(identifier = job.identifier(), error = %e, "cannot materialize job");
                        }
                    }
                }
                Ok(raw) => warn!(
                    expected = batch.len(),
                    received = raw.len(),
                    "response length does not match batch, leaving batch unmaterialized"
                ),
                Err(e) => warn!(jobs = batch.len(), error = %e, "cannot decode batch response"),
            }

            self.pacer.wait().await;
            Cycle::Accepted
        }
        .instrument(span.clone())
        .await
    }

    /// Sign and send; hands back the response only for a 200.
    async fn send(
        &self,
        mode: Mode,
        request: RequestBuilder,
        span: &Span,
    ) -> std::result::Result<Response, Cycle> {
        let start = Instant::now();
        let result = self.signer.sign(request).send().await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) => {
                let status = response.status();
                record_status(span, status.as_u16());
                self.metrics.record_request(mode, Some(status.as_u16()), duration_ms);
                if status == StatusCode::OK {
                    debug!(duration_ms, "request accepted");
                    Ok(response)
                } else {
                    warn!(status = status.as_u16(), duration_ms, "request rejected");
                    Err(Cycle::Rejected(status.as_u16()))
                }
            }
            Err(e) => {
                self.metrics.record_request(mode, None, duration_ms);
                warn!(error = %e, duration_ms, "request failed");
                Err(Cycle::Unreachable)
            }
        }
    }

    pub(crate) fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }
}

/// Request body for a batch: every identifier followed by `\n`, in order.
pub fn batch_body<J: Job>(batch: &[J]) -> String {
    let mut body = String::with_capacity(batch.iter().map(|j| j.identifier().len() + 1).sum());
    for job in batch {
        body.push_str(job.identifier());
        body.push('\n');
    }
    body
}
