//! Lifecycle controller: start the pool, hand out queue handles, shut down.
//!
//! ```no_run
//! # async fn example() -> workq_dispatch::error::Result<()> {
//! use workq_dispatch::auth::NoAuth;
//! use workq_dispatch::config::WorkerConfig;
//! use workq_dispatch::engine::Dispatcher;
//! use workq_dispatch::job::RawJob;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = WorkerConfig { path: Some("title".into()), ..Default::default() };
//! let (dispatcher, mut outbox) =
//!     Dispatcher::<RawJob>::start(&config, Arc::new(NoAuth), CancellationToken::new())?;
//!
//! let inbox = dispatcher.inbox();
//! tokio::spawn(async move {
//!     for host in ["one.com", "two.com"] {
//!         if inbox.submit(RawJob::new(host)).await.is_err() {
//!             break;
//!         }
//!     }
//!     dispatcher.shutdown().await;
//! });
//!
//! while let Some(job) = outbox.recv().await {
//!     println!("{} -> {}", job.request, job.status);
//! }
//! # Ok(())
//! # }
//! ```

use crate::auth::SignRequest;
use crate::config::{Mode, ResolvedConfig, WorkerConfig};
use crate::error::{Error, Result};
use crate::job::Job;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use super::executor::Executor;
use super::pacer::Pacer;
use super::unit::{SharedInbox, Unit};

/// A running pool of execution units bound to one worker cluster endpoint.
///
/// Dropping a dispatcher without calling [`Dispatcher::shutdown`] leaves the
/// units running until every [`Inbox`] handle is gone.
pub struct Dispatcher<J: Job> {
    config: Arc<ResolvedConfig>,
    inbox: Inbox<J>,
    shared: Arc<SharedInbox<J>>,
    outbox: mpsc::Sender<J>,
    tracker: TaskTracker,
    pacer: Arc<Pacer>,
}

impl<J: Job> Dispatcher<J> {
    /// Resolve `config`, allocate the queues, start the pacer and spawn the
    /// execution units. Must be called from within a tokio runtime.
    ///
    /// `cancel` abandons result delivery: a job whose push to the outbox is
    /// still pending when it fires is dropped.
    pub fn start(
        config: &WorkerConfig,
        signer: Arc<dyn SignRequest>,
        cancel: CancellationToken,
    ) -> Result<(Self, Outbox<J>)> {
        let resolved = Arc::new(config.resolve());
        let pacer = Arc::new(Pacer::start(resolved.pacer));
        let executor = Executor::new(Arc::clone(&resolved), signer, Arc::clone(&pacer))?;
        Ok(Self::spawn(resolved, executor, pacer, cancel))
    }

    /// Like [`Dispatcher::start`], reusing an existing [`reqwest::Client`].
    /// The configured transport timeout is not applied to `client`.
    pub fn start_with_client(
        config: &WorkerConfig,
        client: reqwest::Client,
        signer: Arc<dyn SignRequest>,
        cancel: CancellationToken,
    ) -> (Self, Outbox<J>) {
        let resolved = Arc::new(config.resolve());
        let pacer = Arc::new(Pacer::start(resolved.pacer));
        let executor =
            Executor::with_client(client, Arc::clone(&resolved), signer, Arc::clone(&pacer));
        Self::spawn(resolved, executor, pacer, cancel)
    }

    fn spawn(
        config: Arc<ResolvedConfig>,
        executor: Executor,
        pacer: Arc<Pacer>,
        cancel: CancellationToken,
    ) -> (Self, Outbox<J>) {
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity());
        let (outbox_tx, outbox_rx) = mpsc::channel(config.outbox_capacity());
        let shared = Arc::new(SharedInbox::new(inbox_rx));
        let tracker = TaskTracker::new();
        let mode = config.mode();

        for id in 0..config.workers {
            let unit = Unit {
                id,
                size: config.size,
                inbox: Arc::clone(&shared),
                outbox: outbox_tx.clone(),
                executor: executor.clone(),
                cancel: cancel.clone(),
            };
            tracker.spawn(unit.run(mode));
        }

        info!(
            base = %config.base,
            %mode,
            workers = config.workers,
            size = config.size,
            pacer_ms = config.pacer.as_millis() as u64,
            "dispatcher started"
        );

        let dispatcher = Self {
            config,
            inbox: Inbox { tx: inbox_tx },
            shared,
            outbox: outbox_tx,
            tracker,
            pacer,
        };
        (dispatcher, Outbox { rx: outbox_rx })
    }

    /// A handle for submitting jobs. Clone it freely across producers.
    pub fn inbox(&self) -> Inbox<J> {
        self.inbox.clone()
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode()
    }

    /// Close the inbox, wait for every unit to drain and finish, close the
    /// outbox and stop the pacer.
    ///
    /// Call once all producers are done. The outbox must keep being drained
    /// while this runs, or units block on a full outbox.
    pub async fn shutdown(self) {
        info!("dispatcher shutting down");
        self.shared.close();
        drop(self.inbox);

        self.tracker.close();
        self.tracker.wait().await;

        drop(self.outbox);
        self.pacer.stop().await;
        info!("dispatcher stopped");
    }
}

/// Submitting side of the inbox.
pub struct Inbox<J> {
    tx: mpsc::Sender<J>,
}

impl<J> Clone for Inbox<J> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<J: Job> Inbox<J> {
    /// Queue a job, waiting while the inbox is full.
    ///
    /// Fails with [`Error::Closed`] once shutdown has begun.
    pub async fn submit(&self, job: J) -> Result<()> {
        self.tx.send(job).await.map_err(|_| Error::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of the outbox. Yields every finished job, successful or
/// not, and `None` once shutdown has completed.
pub struct Outbox<J> {
    rx: mpsc::Receiver<J>,
}

impl<J: Job> Outbox<J> {
    pub async fn recv(&mut self) -> Option<J> {
        self.rx.recv().await
    }

    /// Drain until the outbox closes.
    pub async fn collect(mut self) -> Vec<J> {
        let mut jobs = Vec::new();
        while let Some(job) = self.rx.recv().await {
            jobs.push(job);
        }
        jobs
    }
}
