use rand::Rng;
use std::time::Duration;

/// How the delay before the next delivery attempt grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// `base * 2^attempt`.
    #[default]
    Exponential,
    /// `base * (2 XOR attempt)`, matching the legacy client's delays.
    XorCompat,
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts; `None` retries forever
    pub max_attempts: Option<u64>,
    /// Multiplier applied to the strategy factor
    pub base_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Upper bound on a single delay
    pub max_backoff: Option<Duration>,
    /// Whether to add ±20% jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::from_millis(1000),
            strategy: BackoffStrategy::Exponential,
            max_backoff: None,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Policy reproducing the legacy XOR delays.
    pub fn xor_compat() -> Self {
        Self {
            strategy: BackoffStrategy::XorCompat,
            ..Self::default()
        }
    }

    /// Whether a ping that just failed `attempt` may be sent again.
    pub fn allows_retry_after(&self, attempt: u64) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    /// Delay to wait after `attempt` failed, before sending `attempt + 1`.
    pub fn delay_after(&self, attempt: u64) -> Duration {
        let factor = match self.strategy {
            BackoffStrategy::Exponential => u32::try_from(attempt)
                .ok()
                .and_then(|exp| 1u64.checked_shl(exp))
                .unwrap_or(u64::MAX),
            BackoffStrategy::XorCompat => 2 ^ attempt,
        };

        let mut delay = u32::try_from(factor).map_or(Duration::MAX, |factor| {
            self.base_delay.saturating_mul(factor)
        });

        if let Some(max) = self.max_backoff {
            delay = delay.min(max);
        }

        if self.jitter {
            delay = apply_jitter(delay);
        }

        delay
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    // ±20% of the backoff duration
    let millis = delay.as_millis().min(u64::MAX as u128) as f64;
    let jitter_range = millis * 0.2;
    if jitter_range <= 0.0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
    Duration::from_millis((millis + jitter).max(0.0) as u64)
}
