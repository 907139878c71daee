//! workq-dispatch CLI — send identifiers to a worker cluster endpoint.

use clap::{Args, Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use workq_dispatch::auth::signer_for;
use workq_dispatch::config::WorkerConfig;
use workq_dispatch::engine::Dispatcher;
use workq_dispatch::job::{Job, RawJob};
use workq_dispatch::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "workq-dispatch", about = "Dispatch jobs to a worker cluster")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch identifiers and print one JSON line per finished job
    Run {
        #[command(flatten)]
        worker: WorkerArgs,
        /// OTLP endpoint for traces, metrics and logs (default: $OTEL_ENDPOINT)
        #[arg(long)]
        otel_endpoint: Option<String>,
        /// Only print jobs that succeeded
        #[arg(long)]
        ok_only: bool,
        /// Identifiers to dispatch; read from stdin when none are given
        identifiers: Vec<String>,
    },
    /// Print the resolved configuration
    Config {
        #[command(flatten)]
        worker: WorkerArgs,
    },
}

#[derive(Args)]
struct WorkerArgs {
    /// TOML file with a [worker] table
    #[arg(long)]
    config: Option<PathBuf>,
    /// Worker cluster address, scheme://host:port
    #[arg(long)]
    host: Option<String>,
    /// Endpoint path segment
    #[arg(long)]
    path: Option<String>,
    /// Query parameters appended to every request
    #[arg(long)]
    params: Option<String>,
    /// Number of execution units
    #[arg(long)]
    workers: Option<usize>,
    /// Jobs per request; >1 switches to batched POST
    #[arg(long)]
    size: Option<usize>,
    /// Use POST with full identifiers even for single jobs (`--full-url=false` overrides the environment)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    full_url: Option<bool>,
    /// Transport timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Minimum delay between accepted requests, in milliseconds
    #[arg(long)]
    pacer_ms: Option<u64>,
}

impl WorkerArgs {
    /// File < environment < flags.
    fn load(self) -> anyhow::Result<WorkerConfig> {
        let file = match &self.config {
            Some(path) => WorkerConfig::from_toml_file(path)?,
            None => WorkerConfig::default(),
        };
        let flags = WorkerConfig {
            host: self.host,
            secret: None,
            path: self.path,
            params: self.params,
            workers: self.workers,
            size: self.size,
            full_url: self.full_url,
            timeout: self.timeout_ms.map(std::time::Duration::from_millis),
            pacer: self.pacer_ms.map(std::time::Duration::from_millis),
        };
        Ok(file.merge(WorkerConfig::from_env()?).merge(flags))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            worker,
            otel_endpoint,
            ok_only,
            identifiers,
        } => cmd_run(worker.load()?, otel_endpoint, ok_only, identifiers).await,
        Command::Config { worker } => cmd_config(worker.load()?),
    }
}

async fn cmd_run(
    config: WorkerConfig,
    otel_endpoint: Option<String>,
    ok_only: bool,
    identifiers: Vec<String>,
) -> anyhow::Result<()> {
    let guard = init_telemetry(TelemetryConfig {
        endpoint: otel_endpoint.or_else(|| std::env::var("OTEL_ENDPOINT").ok()),
        ..TelemetryConfig::default()
    })?;

    let identifiers = if identifiers.is_empty() {
        read_identifiers(std::io::stdin().lock())?
    } else {
        identifiers
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        warn!("interrupted, abandoning remaining results");
        on_signal.cancel();
    });

    let signer = signer_for(&config);
    let (dispatcher, mut outbox) = Dispatcher::<RawJob>::start(&config, signer, cancel.clone())?;

    let inbox = dispatcher.inbox();
    let producer = tokio::spawn(async move {
        for identifier in identifiers {
            if inbox.submit(RawJob::new(identifier)).await.is_err() {
                break;
            }
        }
        drop(inbox);
        dispatcher.shutdown().await;
    });

    let (mut ok, mut failed) = (0usize, 0usize);
    loop {
        let job = tokio::select! {
            job = outbox.recv() => job,
            _ = cancel.cancelled() => None,
        };
        let Some(job) = job else { break };

        if job.succeeded() {
            ok += 1;
        } else {
            failed += 1;
            if ok_only {
                continue;
            }
        }
        println!("{}", serde_json::to_string(&job)?);
    }

    if !cancel.is_cancelled() {
        producer.await?;
    }
    info!(ok, failed, "dispatch finished");
    guard.force_flush();
    Ok(())
}

fn cmd_config(config: WorkerConfig) -> anyhow::Result<()> {
    let resolved = config.resolve();
    println!("Base:       {}", resolved.base);
    println!(
        "Params:     {}",
        if resolved.params.is_empty() {
            "-"
        } else {
            resolved.params.as_str()
        }
    );
    println!("Mode:       {}", resolved.mode());
    println!("Workers:    {}", resolved.workers);
    println!("Size:       {}", resolved.size);
    println!("Timeout:    {}ms", resolved.timeout.as_millis());
    println!("Pacer:      {}ms", resolved.pacer.as_millis());
    println!(
        "Auth:       {}",
        if config.secret.is_some() {
            "bearer"
        } else {
            "none"
        }
    );
    Ok(())
}

/// One identifier per line; surrounding whitespace and blank lines dropped.
fn read_identifiers(reader: impl BufRead) -> std::io::Result<Vec<String>> {
    let mut identifiers = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            identifiers.push(line.to_string());
        }
    }
    Ok(identifiers)
}
