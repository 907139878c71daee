//! Execution units: the workers that drain the inbox.

use crate::config::Mode;
use crate::job::{Batch, Job};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::executor::Executor;

/// The receiving side of the inbox, shared by every unit.
///
/// Each job is handed to exactly one unit. Once `close` is called no new
/// jobs are accepted, but jobs already buffered are still handed out.
pub(crate) struct SharedInbox<J> {
    rx: Mutex<mpsc::Receiver<J>>,
    closing: CancellationToken,
}

impl<J: Job> SharedInbox<J> {
    pub(crate) fn new(rx: mpsc::Receiver<J>) -> Self {
        Self {
            rx: Mutex::new(rx),
            closing: CancellationToken::new(),
        }
    }

    /// Next job, or `None` once the inbox is closed and drained.
    pub(crate) async fn next(&self) -> Option<J> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            job = rx.recv() => job,
            _ = self.closing.cancelled() => {
                rx.close();
                rx.recv().await
            }
        }
    }

    pub(crate) fn close(&self) {
        self.closing.cancel();
    }
}

pub(crate) struct Unit<J> {
    pub(crate) id: usize,
    pub(crate) size: usize,
    pub(crate) inbox: Arc<SharedInbox<J>>,
    pub(crate) outbox: mpsc::Sender<J>,
    pub(crate) executor: Executor,
    pub(crate) cancel: CancellationToken,
}

impl<J: Job> Unit<J> {
    pub(crate) async fn run(self, mode: Mode) {
        debug!(unit = self.id, %mode, "execution unit started");
        match mode {
            Mode::Single => self.run_single().await,
            Mode::Batch => self.run_batch().await,
        }
        debug!(unit = self.id, "execution unit finished");
    }

    async fn run_single(&self) {
        while let Some(mut job) = self.inbox.next().await {
            let cycle = self.executor.get(self.id, &mut job).await;
            if !cycle.is_accepted() {
                debug!(unit = self.id, identifier = job.identifier(), ?cycle, "job left unfulfilled");
            }
            self.deliver(job).await;
        }
    }

    async fn run_batch(&self) {
        let mut batch: Batch<J> = Vec::new();
        while let Some(job) = self.inbox.next().await {
            batch.push(job);
            if batch.len() == self.size {
                self.flush(&mut batch).await;
            }
        }
        // partial batch left over when the inbox closed
        if !batch.is_empty() {
            self.flush(&mut batch).await;
        }
    }

    async fn flush(&self, batch: &mut Batch<J>) {
        let cycle = self.executor.post(self.id, batch).await;
        if !cycle.is_accepted() {
            debug!(unit = self.id, jobs = batch.len(), ?cycle, "batch left unfulfilled");
        }
        for job in batch.drain(..) {
            self.deliver(job).await;
        }
    }

    /// Push a finished job to the outbox, unless cancellation fires first.
    async fn deliver(&self, job: J) {
        let succeeded = job.succeeded();
        let metrics = self.executor.metrics();
        tokio::select! {
            biased;
            sent = self.outbox.send(job) => match sent {
                Ok(()) => metrics.record_completed(succeeded),
                Err(_) => {
                    info!(unit = self.id, "outbox receiver gone, job discarded");
                    metrics.record_dropped();
                }
            },
            _ = self.cancel.cancelled() => {
                debug!(unit = self.id, "cancelled during delivery, job dropped");
                metrics.record_dropped();
            }
        }
    }
}
