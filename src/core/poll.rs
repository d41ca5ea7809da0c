//! Bounded polling
//!
//! Every wait in the supervisor (dependency readiness, crash-on-start grace
//! check, exit after SIGTERM, port release) goes through [`PollPolicy`]: a fixed
//! interval, a mandatory deadline and an optional attempt cap.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    deadline: Duration,
    max_attempts: Option<u32>,
}

/// What happened during a poll run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub satisfied: bool,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            deadline,
            max_attempts: None,
        }
    }

    /// `count` checks spaced by `interval`; the deadline follows from both.
    pub fn attempts(interval: Duration, count: u32) -> Self {
        let count = count.max(1);
        Self {
            interval,
            deadline: interval.saturating_mul(count - 1),
            max_attempts: Some(count),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run a synchronous check until it returns `true` or the policy is exhausted.
    pub async fn until<F>(&self, mut check: F) -> PollOutcome
    where
        F: FnMut() -> bool,
    {
        self.until_async(|| std::future::ready(check())).await
    }

    /// Run an asynchronous check until it returns `true` or the policy is exhausted.
    ///
    /// The first check happens immediately. The last sleep is shortened so the
    /// final check lands on the deadline rather than past it.
    pub async fn until_async<F, Fut>(&self, mut check: F) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if check().await {
                return PollOutcome {
                    satisfied: true,
                    attempts,
                    elapsed: started.elapsed(),
                };
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                break;
            }

            let elapsed = started.elapsed();
            if elapsed >= self.deadline {
                break;
            }
            sleep(self.interval.min(self.deadline - elapsed)).await;
        }

        PollOutcome {
            satisfied: false,
            attempts,
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let policy = PollPolicy::new(Duration::from_millis(100), Duration::from_secs(5));
        let mut calls = 0;
        let outcome = policy
            .until(|| {
                calls += 1;
                calls == 3
            })
            .await;

        assert!(outcome.satisfied);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.elapsed, Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_never_exceeded() {
        let policy = PollPolicy::new(Duration::from_millis(300), Duration::from_secs(1));
        let outcome = policy.until(|| false).await;

        assert!(!outcome.satisfied);
        // checks at 0, 300, 600, 900 and a final one shortened to 1000ms
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.elapsed, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_cap_limits_checks() {
        let policy = PollPolicy::attempts(Duration::from_millis(500), 10);
        assert_eq!(policy.deadline(), Duration::from_millis(4500));

        let mut calls = 0;
        let outcome = policy
            .until(|| {
                calls += 1;
                false
            })
            .await;

        assert!(!outcome.satisfied);
        assert_eq!(calls, 10);
        assert_eq!(outcome.attempts, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_deadline_checks_once() {
        let policy = PollPolicy::new(Duration::from_millis(100), Duration::ZERO);
        let outcome = policy.until(|| false).await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn async_checks_are_awaited() {
        let policy =
            PollPolicy::new(Duration::from_millis(50), Duration::from_secs(1)).with_max_attempts(2);
        let outcome = policy
            .until_async(|| async {
                sleep(Duration::from_millis(10)).await;
                false
            })
            .await;
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.elapsed, Duration::from_millis(70));
    }
}
