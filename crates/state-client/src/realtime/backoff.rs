//! Reconnect delay schedule.

use std::time::Duration;

/// Exponential backoff: the Nth consecutive failure waits
/// `min(floor * 2^(N-1), ceiling)`. A successful open calls [`Backoff::reset`].
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling: ceiling.max(floor),
            failures: 0,
        }
    }

    /// Record one more failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay_for(self.failures)
    }

    /// Delay for the given consecutive failure count. Zero failures means no wait.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let multiplier = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.floor.saturating_mul(multiplier).min(self.ceiling)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
