//! Deadline + interval polling.
//!
//! The platform populates its device state asynchronously, so the prober polls it.
//! A `RetrySchedule` bounds that polling by a total wait budget and resolves to
//! `Err(Elapsed)` once the budget is spent; nothing runs after that.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Simple mode: wait for the platform to populate its input devices.
pub const DEVICE_LIST_INTERVAL: Duration = Duration::from_millis(250);
pub const DEVICE_LIST_BUDGET: Duration = Duration::from_millis(5000);

/// Workaround mode: wait for the platform to bind the patched device.
pub const CONVERGENCE_INTERVAL: Duration = Duration::from_millis(100);
pub const CONVERGENCE_BUDGET: Duration = Duration::from_millis(2000);

/// The schedule ran out before the condition held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elapsed {
    pub waited: Duration,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    pub interval: Duration,
    pub budget: Duration,
}

impl RetrySchedule {
    pub const fn new(interval: Duration, budget: Duration) -> Self {
        Self { interval, budget }
    }

    pub const fn device_list() -> Self {
        Self::new(DEVICE_LIST_INTERVAL, DEVICE_LIST_BUDGET)
    }

    pub const fn convergence() -> Self {
        Self::new(CONVERGENCE_INTERVAL, CONVERGENCE_BUDGET)
    }

    /// Poll `check` until it yields `Some`, sleeping `interval` between attempts.
    ///
    /// The first attempt runs immediately. A final attempt is made at the deadline,
    /// so a condition that becomes true exactly as the budget runs out still counts.
    pub async fn poll<T, F, Fut>(&self, mut check: F) -> Result<T, Elapsed>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let started = Instant::now();
        let deadline = started + self.budget;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let Some(value) = check().await {
                debug!(attempts, waited_ms = started.elapsed().as_millis() as u64, "poll condition met");
                return Ok(value);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Elapsed {
                    waited: now.duration_since(started),
                    attempts,
                });
            }
            let next = (now + self.interval).min(deadline);
            tokio::time::sleep_until(next).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn immediate_success_does_not_sleep() {
        let started = Instant::now();
        let out = RetrySchedule::device_list().poll(|| async { Some(7) }).await;
        assert_eq!(out, Ok(7));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_condition_flips() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let out = RetrySchedule::convergence()
            .poll(move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move { (n >= 3).then_some(n) }
            })
            .await;
        assert_eq!(out, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_budget() {
        let started = Instant::now();
        let out: Result<(), Elapsed> = RetrySchedule::convergence().poll(|| async { None }).await;
        let elapsed = out.unwrap_err();
        assert_eq!(elapsed.waited, CONVERGENCE_BUDGET);
        // t=0, 100, ..., 2000
        assert_eq!(elapsed.attempts, 21);
        assert_eq!(started.elapsed(), CONVERGENCE_BUDGET);
    }

    #[test]
    fn zero_budget_makes_one_attempt() {
        let schedule = RetrySchedule::new(Duration::from_millis(10), Duration::ZERO);
        let out: Result<(), Elapsed> = tokio_test::block_on(schedule.poll(|| async { None }));
        assert_eq!(out.unwrap_err().attempts, 1);
    }
}
