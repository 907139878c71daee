//! Completion-rate pacer.
//!
//! A single periodic timer shared by every execution unit. A unit waits for
//! the next tick only after a request the cluster accepted; failed requests
//! are not throttled.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior};

pub struct Pacer {
    period: Duration,
    interval: Mutex<Option<Interval>>,
}

impl Pacer {
    /// Start ticking. The first tick fires one period from now.
    pub fn start(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            period,
            interval: Mutex::new(Some(interval)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick. Each tick releases exactly one waiter.
    ///
    /// Returns immediately once the pacer is stopped.
    pub async fn wait(&self) {
        let mut interval = self.interval.lock().await;
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        }
    }

    pub async fn stop(&self) {
        self.interval.lock().await.take();
    }

    pub async fn is_stopped(&self) -> bool {
        self.interval.lock().await.is_none()
    }
}
