//! Backoff and settle timing for re-authentication.
//!
//! Every authentication failure episode bumps a client-wide counter. The wait
//! before logging in again grows exponentially with that counter and is never
//! reset, so a backend that keeps rejecting sessions is hit less and less often.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Timing applied when a request has to re-authenticate.
///
/// The delay for the N-th episode is
/// `base_delay * 2^max(1, N) + U[0, max_jitter)`.
///
/// # Examples
///
/// ```
/// use frisquet_connect::ReauthPolicy;
/// use std::time::Duration;
///
/// let policy = ReauthPolicy::default();
/// assert_eq!(policy.base_delay_for_attempt(1), Duration::from_secs(2));
/// assert_eq!(policy.base_delay_for_attempt(3), Duration::from_secs(8));
///
/// let capped = ReauthPolicy::builder().max_exponent(4).build();
/// assert_eq!(capped.base_delay_for_attempt(10), Duration::from_secs(16));
/// ```
#[derive(Debug, Clone)]
pub struct ReauthPolicy {
    /// Multiplied by `2^max(1, attempt)`.
    pub base_delay: Duration,

    /// Upper bound (exclusive) of the uniform random jitter.
    pub max_jitter: Duration,

    /// Fixed wait between a successful login and the replay.
    pub settle_delay: Duration,

    /// Clamp for the exponent. `None` keeps growing for the life of the client.
    pub max_exponent: Option<u32>,
}

impl Default for ReauthPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(100),
            settle_delay: Duration::from_millis(500),
            max_exponent: None,
        }
    }
}

impl ReauthPolicy {
    /// Creates a new builder starting from the default timings.
    pub fn builder() -> ReauthPolicyBuilder {
        ReauthPolicyBuilder::default()
    }

    /// Returns the backoff for the given episode without jitter.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn base_delay_for_attempt(&self, attempt: u64) -> Duration {
        let exponent = attempt.max(1).min(u64::from(u32::MAX)) as u32;
        let exponent = match self.max_exponent {
            Some(cap) => exponent.min(cap),
            None => exponent,
        };

        let nanos = self.base_delay.as_nanos();
        let scaled = 1u128
            .checked_shl(exponent)
            .and_then(|multiplier| nanos.checked_mul(multiplier));

        match scaled {
            Some(total) => match u64::try_from(total / NANOS_PER_SEC) {
                Ok(secs) => Duration::new(secs, (total % NANOS_PER_SEC) as u32),
                Err(_) => Duration::MAX,
            },
            None if nanos == 0 => Duration::ZERO,
            None => Duration::MAX,
        }
    }

    /// Returns the backoff for the given episode, jitter included.
    pub fn delay_for_attempt(&self, attempt: u64) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        if self.max_jitter.is_zero() {
            return base;
        }
        let fraction: f64 = rand::thread_rng().gen();
        base.saturating_add(self.max_jitter.mul_f64(fraction))
    }
}

/// Builder for [`ReauthPolicy`].
#[derive(Default)]
pub struct ReauthPolicyBuilder {
    base_delay: Option<Duration>,
    max_jitter: Option<Duration>,
    settle_delay: Option<Duration>,
    max_exponent: Option<u32>,
}

impl ReauthPolicyBuilder {
    /// Sets the base delay of the exponential backoff.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Sets the jitter bound.
    pub fn max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = Some(jitter);
        self
    }

    /// Sets the wait between login and replay.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    /// Caps the backoff exponent.
    pub fn max_exponent(mut self, cap: u32) -> Self {
        self.max_exponent = Some(cap);
        self
    }

    /// Builds the `ReauthPolicy`.
    pub fn build(self) -> ReauthPolicy {
        let default = ReauthPolicy::default();
        ReauthPolicy {
            base_delay: self.base_delay.unwrap_or(default.base_delay),
            max_jitter: self.max_jitter.unwrap_or(default.max_jitter),
            settle_delay: self.settle_delay.unwrap_or(default.settle_delay),
            max_exponent: self.max_exponent.or(default.max_exponent),
        }
    }
}

/// Number of authentication failure episodes seen by a client.
#[derive(Debug, Default)]
pub(crate) struct AttemptCounter(AtomicU64);

impl AttemptCounter {
    /// Records a new episode and returns its number (starting at 1).
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    /// Returns the number of episodes recorded so far.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_delays() {
        let policy = ReauthPolicy::default();

        // The first episode already waits 2^1 seconds.
        assert_eq!(policy.base_delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(policy.base_delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.base_delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.base_delay_for_attempt(4), Duration::from_secs(16));
    }

    #[test]
    fn test_lower_bound_is_non_decreasing() {
        let policy = ReauthPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..200 {
            let delay = policy.base_delay_for_attempt(attempt);
            assert!(delay >= previous, "attempt {} went down", attempt);
            previous = delay;
        }
        assert_eq!(policy.base_delay_for_attempt(u64::MAX), Duration::MAX);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = ReauthPolicy::default();
        for attempt in 1..6 {
            let base = policy.base_delay_for_attempt(attempt);
            for _ in 0..50 {
                let delay = policy.delay_for_attempt(attempt);
                assert!(delay >= base);
                assert!(delay < base + Duration::from_millis(100));
            }
        }
    }

    #[test]
    fn test_max_exponent_caps_growth() {
        let policy = ReauthPolicy::builder()
            .base_delay(Duration::from_millis(10))
            .max_exponent(3)
            .build();

        assert_eq!(policy.base_delay_for_attempt(2), Duration::from_millis(40));
        assert_eq!(policy.base_delay_for_attempt(3), Duration::from_millis(80));
        assert_eq!(policy.base_delay_for_attempt(50), Duration::from_millis(80));
    }

    #[test]
    fn test_counter_is_monotonic() {
        let counter = AttemptCounter::default();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.current(), 2);
    }
}
