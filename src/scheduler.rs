//! Paced sequential batches.
//!
//! Drives a strictly sequential batch of attempts while respecting the
//! provider's requests-per-minute budget. Every item is charged
//! `per_item_delay * requests_made`; whatever part of that slot the item did
//! not spend itself is slept before the next item starts.

use crate::clock::Clock;
use crate::types::{AttemptOutcome, RateBudget};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Paces one batch (or a sequence of rounds) against one provider account.
///
/// Each batch owns its limiter; limiters are never shared between batches.
pub struct RateLimiter {
    budget: RateBudget,
    clock: Arc<dyn Clock>,
    /// Earliest clock reading at which the next request may be sent.
    next_slot: Option<Duration>,
}

impl RateLimiter {
    pub fn new(budget: RateBudget, clock: Arc<dyn Clock>) -> Self {
        Self {
            budget,
            clock,
            next_slot: None,
        }
    }

    pub fn budget(&self) -> RateBudget {
        self.budget
    }

    /// `60 / rate + margin`.
    pub fn per_item_delay(&self) -> Duration {
        self.budget.per_request_delay()
    }

    /// Run `worker` over `items` in order and collect the results.
    ///
    /// An empty batch returns immediately without sleeping.
    pub async fn run_batch<I, T, F, Fut>(&mut self, items: Vec<I>, worker: F) -> Vec<T>
    where
        F: FnMut(usize, I) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let mut results = Vec::with_capacity(items.len());
        self.run_batch_into(items, &mut results, worker).await;
        results
    }

    /// Like [`RateLimiter::run_batch`], but hands each result to `sink` as
    /// soon as it is produced, so a caller that cancels the future keeps the
    /// results finished so far.
    pub async fn run_batch_into<I, T, S, F, Fut>(&mut self, items: Vec<I>, sink: &mut S, mut worker: F)
    where
        S: Extend<T>,
        F: FnMut(usize, I) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        for (position, item) in items.into_iter().enumerate() {
            self.wait_for_slot().await;

            let started = self.clock.now();
            let outcome = worker(position, item).await;
            sink.extend(std::iter::once(outcome.result));

            let charged = self.per_item_delay() * outcome.requests_made;
            self.next_slot = Some(started + charged);
        }
    }

    /// Sleep until the slot reserved by the previous item has passed.
    async fn wait_for_slot(&self) {
        let Some(next_slot) = self.next_slot else {
            return;
        };
        let now = self.clock.now();
        let wait = next_slot.saturating_sub(now);
        if wait.is_zero() {
            return;
        }
        debug!(wait_ms = wait.as_millis() as u64, "Pacing before next request");
        self.clock.sleep(wait).await;
    }
}
