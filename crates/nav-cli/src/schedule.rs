//! When each track family is next fetched.
//!
//! A family is due immediately at startup, then once per refresh period
//! after every completed fetch. Failed fetches are retried sooner, on a
//! doubling delay that starts at `RETRY_BASE` and never exceeds the
//! configured maximum. Retry delays carry up to 20% random jitter so
//! families that failed together do not retry in lockstep.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use crate::config::Config;

const RETRY_BASE: Duration = Duration::from_secs(30);
const JITTER_DIVISOR: u32 = 5;

#[derive(Debug)]
pub struct RefreshSchedule {
    period: Duration,
    max_retry: Duration,
    failures: u32,
    next_due: Instant,
    jitter: RandomState,
}

impl RefreshSchedule {
    pub fn new(period: Duration, max_retry: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        Self {
            period,
            max_retry: max_retry.max(Duration::from_millis(1)),
            failures: 0,
            next_due: Instant::now(),
            jitter: RandomState::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.refresh_secs),
            Duration::from_secs(config.backoff_max_secs),
        )
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Consecutive failed fetches since the last completed one.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Sleep until the family is due.
    pub async fn wait(&self) {
        sleep_until(self.next_due).await;
    }

    /// A fetch completed; the next one is a full period away.
    pub fn completed(&mut self) {
        self.failures = 0;
        self.next_due = Instant::now() + self.period;
    }

    /// A fetch failed; returns how long until the retry.
    pub fn failed(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.retry_delay();
        self.next_due = Instant::now() + delay;
        delay
    }

    fn retry_delay(&self) -> Duration {
        let doublings = self.failures.saturating_sub(1).min(16);
        let step = RETRY_BASE
            .min(self.period)
            .saturating_mul(1 << doublings)
            .min(self.max_retry);
        let spread = (step / JITTER_DIVISOR).as_millis() as u64;
        if spread == 0 {
            return step;
        }
        let roll = self.jitter.hash_one(self.failures) % (spread + 1);
        step + Duration::from_millis(roll)
    }
}
