//! Worker cluster configuration and mode resolution.
//!
//! `WorkerConfig` is what callers fill in (from code, the environment, or a
//! TOML file); every field is optional. `WorkerConfig::resolve` turns it into
//! an immutable `ResolvedConfig` that the dispatcher runs with. Resolution
//! never fails: missing or odd values are corrected to usable defaults.
//!
//! Sensitive values are wrapped in secrecy::SecretString to prevent log leaks.

use crate::error::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "http://localhost:1455";
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_PACER: Duration = Duration::from_millis(10);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on either queue's capacity, well below tokio's channel limit.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// Caller-facing configuration. Unset fields take defaults at resolve time.
#[derive(Debug, Default)]
pub struct WorkerConfig {
    /// `scheme://host:port` of the worker cluster.
    pub host: Option<String>,
    /// Shared secret used by the default request signer.
    pub secret: Option<SecretString>,
    /// Endpoint path segment, e.g. `title`.
    pub path: Option<String>,
    /// Query segment appended to every request, with or without the `?`.
    pub params: Option<String>,
    /// Number of execution units.
    pub workers: Option<usize>,
    /// Jobs per request. 0 or 1 is single-item; >1 forces batched POST.
    pub size: Option<usize>,
    /// Send full identifiers in a POST body even when `size` is 1.
    pub full_url: Option<bool>,
    pub timeout: Option<Duration>,
    pub pacer: Option<Duration>,
}

/// How execution units talk to the cluster. Chosen once at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One job per `GET {base}/{identifier}{params}`.
    Single,
    /// Up to `size` jobs per `POST {base}{params}`.
    Batch,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Single => "get",
            Mode::Batch => "post",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved, immutable engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Scheme, host and path; never ends with `/`.
    pub base: String,
    /// Empty, or starts with `?`.
    pub params: String,
    pub workers: usize,
    /// Always at least 1.
    pub size: usize,
    /// Always true when `size > 1`.
    pub full_url: bool,
    pub timeout: Duration,
    pub pacer: Duration,
}

impl ResolvedConfig {
    pub fn mode(&self) -> Mode {
        if self.full_url {
            Mode::Batch
        } else {
            Mode::Single
        }
    }

    /// Target for a single-item request.
    pub fn get_url(&self, identifier: &str) -> String {
        format!("{}/{}{}", self.base, identifier, self.params)
    }

    /// Target for a batched request.
    pub fn post_url(&self) -> String {
        format!("{}{}", self.base, self.params)
    }

    pub fn inbox_capacity(&self) -> usize {
        queue_capacity(self.workers)
    }

    pub fn outbox_capacity(&self) -> usize {
        queue_capacity(self.workers.saturating_mul(self.size))
    }
}

impl WorkerConfig {
    /// Apply defaults and mode rules. Pure; always yields a usable config.
    pub fn resolve(&self) -> ResolvedConfig {
        let size = match self.size {
            None | Some(0) => 1,
            Some(n) => n,
        };
        // batched requests need the POST wire format
        let full_url = self.full_url.unwrap_or(false) || size > 1;

        let workers = match self.workers {
            None | Some(0) => DEFAULT_WORKERS,
            Some(n) => n,
        };

        ResolvedConfig {
            base: resolve_base(self.host.as_deref(), self.path.as_deref()),
            params: resolve_params(self.params.as_deref()),
            workers,
            size,
            full_url,
            timeout: non_zero_or(self.timeout, DEFAULT_TIMEOUT),
            pacer: non_zero_or(self.pacer, DEFAULT_PACER),
        }
    }

    /// Load configuration from `WORKER_*` environment variables.
    ///
    /// Unset variables stay unset. In local dev, call `dotenvy::dotenv().ok()`
    /// before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("WORKER_HOST").ok(),
            secret: std::env::var("WORKER_SECRET").ok().map(SecretString::from),
            path: std::env::var("WORKER_PATH").ok(),
            params: std::env::var("WORKER_PARAMS").ok(),
            workers: optional_var("WORKER_WORKERS")?,
            size: optional_var("WORKER_SIZE")?,
            full_url: optional_var("WORKER_FULL_URL")?,
            timeout: optional_var("WORKER_TIMEOUT_MS")?.map(Duration::from_millis),
            pacer: optional_var("WORKER_PACER_MS")?.map(Duration::from_millis),
        })
    }

    /// Load configuration from the `[worker]` table of a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad worker config {}: {e}", path.display())))?;
        Ok(file.worker.into())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad worker config: {e}")))?;
        Ok(file.worker.into())
    }

    /// Overlay every field that is set in `other` onto `self`.
    pub fn merge(mut self, other: WorkerConfig) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(host, secret, path, params, workers, size, full_url, timeout, pacer);
        self
    }
}

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    worker: RawWorkerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWorkerConfig {
    host: Option<String>,
    secret: Option<String>,
    path: Option<String>,
    params: Option<String>,
    workers: Option<usize>,
    size: Option<usize>,
    full_url: Option<bool>,
    timeout_ms: Option<u64>,
    pacer_ms: Option<u64>,
}

impl From<RawWorkerConfig> for WorkerConfig {
    fn from(raw: RawWorkerConfig) -> Self {
        Self {
            host: raw.host,
            secret: raw.secret.map(SecretString::from),
            path: raw.path,
            params: raw.params,
            workers: raw.workers,
            size: raw.size,
            full_url: raw.full_url,
            timeout: raw.timeout_ms.map(Duration::from_millis),
            pacer: raw.pacer_ms.map(Duration::from_millis),
        }
    }
}

fn resolve_base(host: Option<&str>, path: Option<&str>) -> String {
    let mut base = match host.map(str::trim) {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => DEFAULT_HOST.to_string(),
    };
    if !base.starts_with("http://") && !base.starts_with("https://") {
        base.insert_str(0, "http://");
    }
    if let Some(path) = path.filter(|p| !p.is_empty()) {
        base.truncate(base.trim_end_matches('/').len());
        base.push('/');
        base.push_str(path.trim_start_matches('/'));
    }
    base.trim_end_matches('/').to_string()
}

fn resolve_params(params: Option<&str>) -> String {
    match params {
        Some(p) if !p.is_empty() && !p.starts_with('?') => format!("?{p}"),
        Some(p) => p.to_string(),
        None => String::new(),
    }
}

/// One and a half times `slots`, clamped to `1..=MAX_QUEUE_CAPACITY`.
fn queue_capacity(slots: usize) -> usize {
    (slots.saturating_mul(3) / 2).clamp(1, MAX_QUEUE_CAPACITY)
}

fn non_zero_or(value: Option<Duration>, default: Duration) -> Duration {
    value.filter(|d| !d.is_zero()).unwrap_or(default)
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
