//! C1: monotonic "sleep until wall time T" with early cancellation.
//!
//! The deadline is converted to a relative duration against `Utc::now()` at
//! the moment `sleep_until` is called, then slept out against
//! `tokio::time::sleep`, which is driven by the runtime's monotonic timer
//! wheel rather than the wall clock. A backward wall-clock jump after the
//! call begins therefore cannot shorten the sleep below what was computed
//! at call time.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The deadline was reached normally.
    Reached,
    /// The deadline had already passed when `sleep_until` was called.
    AlreadyPast,
    /// The cancellation token fired before the deadline.
    Cancelled,
}

#[derive(Clone)]
pub struct Clock {
    cancellation: CancellationToken,
}

impl Clock {
    #[must_use]
    pub fn new(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    /// Sleeps until `deadline`, or until cancelled, whichever comes first.
    pub async fn sleep_until(&self, deadline: DateTime<Utc>) -> SleepOutcome {
        let now = Utc::now();
        if deadline <= now {
            return SleepOutcome::AlreadyPast;
        }
        let remaining = (deadline - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.sleep_for(remaining).await
    }

    pub async fn sleep_for(&self, duration: Duration) -> SleepOutcome {
        if duration.is_zero() {
            return SleepOutcome::AlreadyPast;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => SleepOutcome::Reached,
            () = self.cancellation.cancelled() => SleepOutcome::Cancelled,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test(start_paused = true)]
    async fn sleeps_until_deadline() {
        let clock = Clock::new(CancellationToken::new());
        let deadline = Utc::now() + ChronoDuration::seconds(5);

        let handle = tokio::spawn({
            let clock = clock.clone();
            async move { clock.sleep_until(deadline).await }
        });

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(handle.await.unwrap(), SleepOutcome::Reached);
    }

    #[tokio::test]
    async fn past_deadline_returns_immediately() {
        let clock = Clock::new(CancellationToken::new());
        let deadline = Utc::now() - ChronoDuration::seconds(1);
        assert_eq!(clock.sleep_until(deadline).await, SleepOutcome::AlreadyPast);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_sleep() {
        let token = CancellationToken::new();
        let clock = Clock::new(token.clone());
        let deadline = Utc::now() + ChronoDuration::seconds(30);

        let handle = tokio::spawn({
            let clock = clock.clone();
            async move { clock.sleep_until(deadline).await }
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        token.cancel();

        assert_eq!(handle.await.unwrap(), SleepOutcome::Cancelled);
    }
}
