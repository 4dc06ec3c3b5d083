//! Exponential reconnect delay with a ceiling.
//!
//! The curve is deterministic: each delay is the previous one multiplied by
//! `factor`, capped at `delay_max`, so successive delays never decrease until
//! [`ExponentialBackoff::reset`] is called. The supervisor only resets once a
//! session has stayed connected for a while; a completed handshake alone does
//! not count.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// The initial backoff delay.
    delay_initial: Duration,
    /// The maximum delay to cap the backoff.
    delay_max: Duration,
    /// The delay the next call returns.
    delay_current: Duration,
    /// The factor to multiply the delay on each iteration.
    factor: f64,
    /// If true, the first call returns zero delay.
    immediate_first: bool,
    immediate_pending: bool,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`].
    ///
    /// A `factor` below 1.0 is clamped to 1.0 to keep the curve monotone.
    #[must_use]
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        immediate_first: bool,
    ) -> Self {
        let delay_max = delay_max.max(delay_initial);
        Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor: factor.max(1.0),
            immediate_first,
            immediate_pending: immediate_first,
        }
    }

    /// Return the next backoff delay and advance the internal state.
    pub fn next_duration(&mut self) -> Duration {
        if self.immediate_pending {
            self.immediate_pending = false;
            return Duration::ZERO;
        }

        let delay = self.delay_current;

        let next_nanos = self.delay_current.as_nanos() as f64 * self.factor;
        let max_nanos = self.delay_max.as_nanos() as f64;
        self.delay_current = Duration::from_nanos(next_nanos.min(max_nanos) as u64);

        delay
    }

    /// Reset the backoff to its initial state.
    pub fn reset(&mut self) {
        self.delay_current = self.delay_initial;
        self.immediate_pending = self.immediate_first;
    }

    /// The delay the next non-immediate call will return.
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.delay_current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth_is_capped() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1600),
            2.0,
            false,
        );

        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_duration().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 1600, 1600]);
    }

    #[test]
    fn test_immediate_first_then_initial() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(8), 2.0, true);

        assert_eq!(backoff.next_duration(), Duration::ZERO);
        assert_eq!(backoff.next_duration(), Duration::from_secs(1));
        assert_eq!(backoff.next_duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_reset_restores_immediate_and_initial() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(8), 2.0, true);
        for _ in 0..4 {
            backoff.next_duration();
        }

        backoff.reset();
        assert_eq!(backoff.next_duration(), Duration::ZERO);
        assert_eq!(backoff.current_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_never_decreases() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(300),
            Duration::from_millis(1000),
            1.5,
            false,
        );

        let mut previous = Duration::ZERO;
        for _ in 0..20 {
            let delay = backoff.next_duration();
            assert!(delay >= previous);
            assert!(delay <= Duration::from_millis(1000));
            previous = delay;
        }
    }

    #[test]
    fn test_factor_below_one_is_clamped() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(500),
            Duration::from_millis(100),
            0.5,
            false,
        );

        assert_eq!(backoff.next_duration(), Duration::from_millis(500));
        assert_eq!(backoff.next_duration(), Duration::from_millis(500));
    }
}
