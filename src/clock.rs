//! Time source used for pacing and polling.
//!
//! Production code sleeps on the tokio timer; tests inject [`ManualClock`] so
//! pacing and polling budgets can be asserted without waiting.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Wait for `duration`. Must be cancellable by dropping the future.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by `tokio::time`.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Virtual clock: `sleep` returns immediately and advances time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep (simulated latency).
    pub fn advance(&self, duration: Duration) {
        self.inner.lock().now += duration;
    }

    /// Every non-zero sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.inner.lock().sleeps.iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let mut state = self.inner.lock();
        state.now += duration;
        state.sleeps.push(duration);
    }
}
