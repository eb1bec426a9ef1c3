//! Retry timing for the restart workflow.
//!
//! Consecutive failures grow the wait multiplicatively. Once the wait would
//! reach `max_wait` it wraps back to `initial_wait`, so the loop keeps retrying
//! forever at a bounded period. A failure that follows a completed apply
//! instead waits out whatever is left of `cooldown_floor`, giving the device
//! time to settle after its configuration changed.

use std::time::Duration;

use tracing::debug;

pub const DEFAULT_INITIAL_WAIT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(86_400_000);
pub const DEFAULT_COOLDOWN_FLOOR: Duration = Duration::from_millis(300_000);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_wait: Duration,
    pub multiplier: f64,
    pub max_wait: Duration,
    pub cooldown_floor: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_wait: DEFAULT_INITIAL_WAIT,
            multiplier: DEFAULT_MULTIPLIER,
            max_wait: DEFAULT_MAX_WAIT,
            cooldown_floor: DEFAULT_COOLDOWN_FLOOR,
        }
    }
}

impl BackoffPolicy {
    /// Wait that follows `current` after another ordinary failure.
    ///
    /// A zero `current` means no wait has been armed yet.
    pub fn next_wait(&self, current: Duration) -> Duration {
        if current.is_zero() {
            return self.initial_wait;
        }
        let grown = Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_wait);
        if grown >= self.max_wait {
            self.initial_wait
        } else {
            grown
        }
    }

    /// Remaining settle time when `elapsed` has passed since the last success,
    /// or `None` once the floor is already met.
    pub fn floor_remaining(&self, elapsed: Duration) -> Option<Duration> {
        (elapsed < self.cooldown_floor).then(|| self.cooldown_floor - elapsed)
    }
}

/// Timing half of the workflow state: when we last went to sleep, when we
/// last succeeded, and how long the current sleep lasts.
#[derive(Debug, Clone)]
pub struct RetryTimer {
    policy: BackoffPolicy,
    wait: Duration,
    last_sleep_at: Duration,
    last_success_at: Duration,
}

impl RetryTimer {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            wait: Duration::ZERO,
            last_sleep_at: Duration::ZERO,
            last_success_at: Duration::ZERO,
        }
    }

    /// Start a sleep at `now` after a failed attempt and return its length.
    ///
    /// `had_updated` is whether the attempt being abandoned had already
    /// applied its change to the device.
    pub fn record_failure(&mut self, now: Duration, had_updated: bool) -> Duration {
        self.last_sleep_at = now;
        let elapsed = self.last_sleep_at.saturating_sub(self.last_success_at);

        self.wait = match self.policy.floor_remaining(elapsed) {
            Some(remaining) if had_updated => remaining,
            _ => self.policy.next_wait(self.wait),
        };
        debug!(
            wait_ms = self.wait.as_millis() as u64,
            had_updated, "retry wait armed"
        );
        self.wait
    }

    pub fn record_success(&mut self, now: Duration) {
        self.last_success_at = now;
    }

    /// Start a sleep at `now` that ends no sooner than `cooldown_floor` after
    /// the last success. A wait already longer than that is kept.
    pub fn rearm_after_success(&mut self, now: Duration) -> Duration {
        let elapsed = now.saturating_sub(self.last_success_at);
        if let Some(remaining) = self.policy.floor_remaining(elapsed) {
            self.wait = remaining;
        }
        self.last_sleep_at = now;
        self.wait
    }

    pub fn can_try_again(&self, now: Duration) -> bool {
        now.saturating_sub(self.last_sleep_at) >= self.wait
    }

    /// Time left before [`RetryTimer::can_try_again`] turns true.
    pub fn remaining(&self, now: Duration) -> Duration {
        self.wait.saturating_sub(now.saturating_sub(self.last_sleep_at))
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn last_sleep_at(&self) -> Duration {
        self.last_sleep_at
    }

    pub fn last_success_at(&self) -> Duration {
        self.last_success_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_consecutive_failures_grow_wait() {
        let mut timer = RetryTimer::new(BackoffPolicy::default());

        assert_eq!(timer.record_failure(ms(1_000), false), ms(5_000));
        assert_eq!(timer.record_failure(ms(7_000), false), ms(7_500));
        assert_eq!(timer.record_failure(ms(15_000), false), ms(11_250));
    }

    #[test]
    fn test_wait_wraps_to_initial_at_ceiling() {
        let policy = BackoffPolicy {
            max_wait: ms(20_000),
            ..BackoffPolicy::default()
        };
        let mut timer = RetryTimer::new(policy);

        let waits: Vec<_> = (0..6)
            .map(|i| timer.record_failure(ms(i * 100_000), false))
            .collect();

        assert_eq!(
            waits,
            vec![ms(5_000), ms(7_500), ms(11_250), ms(16_875), ms(5_000), ms(7_500)]
        );
    }

    #[test]
    fn test_failure_after_apply_waits_out_floor() {
        let mut timer = RetryTimer::new(BackoffPolicy::default());
        timer.record_failure(ms(0), false);
        timer.record_success(ms(10_000));

        let wait = timer.record_failure(ms(70_000), true);
        assert_eq!(wait, ms(240_000));
    }

    #[test]
    fn test_floor_ignored_without_apply() {
        let mut timer = RetryTimer::new(BackoffPolicy::default());
        timer.record_success(ms(10_000));

        assert_eq!(timer.record_failure(ms(20_000), false), ms(5_000));
    }

    #[test]
    fn test_floor_ignored_once_elapsed() {
        let mut timer = RetryTimer::new(BackoffPolicy::default());
        timer.record_success(ms(0));

        assert_eq!(timer.record_failure(ms(400_000), true), ms(5_000));
    }

    #[test]
    fn test_can_try_again_boundary() {
        let mut timer = RetryTimer::new(BackoffPolicy::default());
        timer.record_failure(ms(1_000), false);

        assert!(!timer.can_try_again(ms(5_999)));
        assert_eq!(timer.remaining(ms(5_999)), ms(1));
        assert!(timer.can_try_again(ms(6_000)));
        assert!(timer.can_try_again(ms(60_000)));
        assert_eq!(timer.remaining(ms(60_000)), Duration::ZERO);
    }

    #[test]
    fn test_rearm_enforces_floor_from_last_success() {
        let mut timer = RetryTimer::new(BackoffPolicy::default());
        timer.record_success(ms(50_000));

        let wait = timer.rearm_after_success(ms(150_000));
        assert_eq!(wait, ms(200_000));
        assert!(!timer.can_try_again(ms(349_999)));
        assert!(timer.can_try_again(ms(350_000)));
    }

    #[test]
    fn test_rearm_keeps_existing_wait_after_floor() {
        let mut timer = RetryTimer::new(BackoffPolicy::default());
        timer.record_failure(ms(0), false);
        timer.record_success(ms(10_000));

        assert_eq!(timer.rearm_after_success(ms(1_000_000)), ms(5_000));
        assert_eq!(timer.last_sleep_at(), ms(1_000_000));
    }

    #[test]
    fn test_huge_multiplier_wraps_instead_of_overflowing() {
        let policy = BackoffPolicy {
            multiplier: f64::MAX,
            ..BackoffPolicy::default()
        };
        assert_eq!(policy.next_wait(ms(5_000)), ms(5_000));
    }
}
