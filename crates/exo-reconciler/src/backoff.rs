use std::time::Duration;

/// Exponential backoff: `floor * 2^(failures - 1)`, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub floor: Duration,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(60),
            cap: Duration::from_secs(60 * 60),
        }
    }
}

impl Backoff {
    pub fn new(floor: Duration, cap: Duration) -> Self {
        Self { floor, cap }
    }

    /// Delay after the given number of consecutive failures (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failures - 1);
        self.floor.saturating_mul(factor).min(self.cap)
    }
}
