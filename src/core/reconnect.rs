//! Auto-reconnect policy.
//!
//! A small state machine that turns unexpected disconnects into a capped
//! exponential-backoff countdown and hands back the attempt to run when a
//! countdown expires. Time only advances through [`ReconnectPolicy::tick`].

use std::time::Duration;

use crate::constants::{COUNTDOWN_STEP, MAX_BACKOFF_EXPONENT, MAX_RECONNECT_DELAY};

/// Delay before reconnect attempt `attempt` (1-indexed): `min(60s, 2^n s)`.
#[must_use]
pub fn reconnect_delay(attempt: u32) -> Duration {
    if attempt > MAX_BACKOFF_EXPONENT {
        return MAX_RECONNECT_DELAY;
    }
    Duration::from_secs(1u64 << attempt).min(MAX_RECONNECT_DELAY)
}

/// "Attempt N of M" for a reconnect-driven connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectAttempt {
    pub attempt: u32,
    pub max: u32,
}

impl ReconnectAttempt {
    /// Failures on the last try are surfaced to the user.
    #[must_use]
    pub const fn is_last_try(self) -> bool {
        self.attempt >= self.max
    }
}

impl std::fmt::Display for ReconnectAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.attempt, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPhase {
    #[default]
    Idle,
    /// Waiting to run `attempt`. The countdown carries its own episode
    /// position so a fresh episode started meanwhile does not disturb it.
    CountingDown {
        attempt: ReconnectAttempt,
        remaining: Duration,
    },
    Retrying(ReconnectAttempt),
    GaveUp,
}

/// Owns the reconnect episode and its attempt counter.
#[derive(Debug, Default)]
pub struct ReconnectPolicy {
    phase: ReconnectPhase,
    attempts: u32,
    last_delay: Option<Duration>,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> ReconnectPhase {
        self.phase
    }

    /// Attempts made so far in the current episode.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }

    #[must_use]
    pub const fn is_counting_down(&self) -> bool {
        matches!(self.phase, ReconnectPhase::CountingDown { .. })
    }

    /// Reacts to an unexpected disconnect.
    ///
    /// Returns the countdown length when a retry was scheduled. Gives up once
    /// `max` attempts have been spent in the current episode.
    pub fn on_unexpected_disconnect(&mut self, enabled: bool, max: u32) -> Option<Duration> {
        if !enabled {
            tracing::debug!("RECONNECT: auto-reconnect disabled");
            return None;
        }
        if self.is_counting_down() {
            tracing::debug!("RECONNECT: countdown already pending");
            return None;
        }
        if self.attempts >= max {
            tracing::info!("RECONNECT: giving up after {} attempts", self.attempts);
            self.give_up();
            return None;
        }

        let attempt = ReconnectAttempt {
            attempt: self.attempts + 1,
            max,
        };
        let delay = reconnect_delay(attempt.attempt);
        tracing::info!("RECONNECT: attempt {attempt} in {}s", delay.as_secs());
        self.phase = ReconnectPhase::CountingDown {
            attempt,
            remaining: delay,
        };
        self.last_delay = Some(delay);
        Some(delay)
    }

    /// Advances a pending countdown by one step.
    ///
    /// Calls `on_progress` with the time left while counting, and returns the
    /// attempt to run once the countdown reaches zero.
    pub fn tick(&mut self, mut on_progress: impl FnMut(Duration)) -> Option<ReconnectAttempt> {
        let ReconnectPhase::CountingDown { attempt, remaining } = self.phase else {
            return None;
        };

        let remaining = remaining.saturating_sub(COUNTDOWN_STEP);
        if remaining.is_zero() {
            self.phase = ReconnectPhase::Retrying(attempt);
            self.attempts = attempt.attempt;
            tracing::info!("RECONNECT: running attempt {attempt}");
            Some(attempt)
        } else {
            self.phase = ReconnectPhase::CountingDown { attempt, remaining };
            on_progress(remaining);
            None
        }
    }

    /// User cancelled the countdown or the retry: same as exhausting attempts.
    ///
    /// Returns whether an episode was active.
    pub fn cancel(&mut self) -> bool {
        let active = matches!(
            self.phase,
            ReconnectPhase::CountingDown { .. } | ReconnectPhase::Retrying(_)
        ) || self.attempts > 0;
        if active {
            tracing::info!("RECONNECT: cancelled");
        }
        self.give_up();
        active
    }

    /// Connected: the episode is over and any pending countdown is dropped.
    pub fn on_connected(&mut self) {
        if self.phase != ReconnectPhase::Idle || self.attempts > 0 {
            tracing::debug!("RECONNECT: connected, episode reset");
        }
        self.phase = ReconnectPhase::Idle;
        self.attempts = 0;
    }

    /// Explicit user connect or disconnect.
    ///
    /// Zeroes the counter but leaves a pending countdown alone; that
    /// countdown still runs the attempt it was scheduled for.
    pub fn begin_fresh_episode(&mut self) {
        self.attempts = 0;
        if matches!(self.phase, ReconnectPhase::Retrying(_)) {
            self.phase = ReconnectPhase::Idle;
        }
    }

    fn give_up(&mut self) {
        self.phase = ReconnectPhase::GaveUp;
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run_countdown(policy: &mut ReconnectPolicy) -> (Vec<u64>, Option<ReconnectAttempt>) {
        let mut progress = Vec::new();
        loop {
            if let Some(attempt) = policy.tick(|left| progress.push(left.as_secs())) {
                return (progress, Some(attempt));
            }
            if !policy.is_counting_down() {
                return (progress, None);
            }
        }
    }

    #[test]
    fn test_delay_table() {
        let secs: Vec<u64> = (1..=7).map(|n| reconnect_delay(n).as_secs()).collect();
        assert_eq!(secs, vec![2, 4, 8, 16, 32, 60, 60]);
        assert_eq!(reconnect_delay(u32::MAX), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn test_disabled_does_nothing() {
        let mut policy = ReconnectPolicy::new();
        assert_eq!(policy.on_unexpected_disconnect(false, 5), None);
        assert_eq!(policy.phase(), ReconnectPhase::Idle);
    }

    #[test]
    fn test_countdown_reports_progress_then_fires() {
        let mut policy = ReconnectPolicy::new();
        assert_eq!(
            policy.on_unexpected_disconnect(true, 3),
            Some(Duration::from_secs(2))
        );
        let (progress, attempt) = run_countdown(&mut policy);
        assert_eq!(progress, vec![1]);
        assert_eq!(attempt, Some(ReconnectAttempt { attempt: 1, max: 3 }));
        assert_eq!(policy.attempts(), 1);
        assert!(matches!(policy.phase(), ReconnectPhase::Retrying(_)));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut policy = ReconnectPolicy::new();
        let mut delays = Vec::new();
        while let Some(delay) = policy.on_unexpected_disconnect(true, 3) {
            delays.push(delay.as_secs());
            let (_, attempt) = run_countdown(&mut policy);
            assert_eq!(attempt.unwrap().is_last_try(), delays.len() == 3);
        }
        assert_eq!(delays, vec![2, 4, 8]);
        assert_eq!(policy.phase(), ReconnectPhase::GaveUp);
        assert_eq!(policy.attempts(), 0);
    }

    #[test]
    fn test_connected_resets_episode() {
        let mut policy = ReconnectPolicy::new();
        policy.on_unexpected_disconnect(true, 5);
        run_countdown(&mut policy);
        policy.on_unexpected_disconnect(true, 5);
        policy.on_connected();
        assert_eq!(policy.phase(), ReconnectPhase::Idle);
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.tick(|_| {}), None);
    }

    #[test]
    fn test_cancel_drops_countdown() {
        let mut policy = ReconnectPolicy::new();
        policy.on_unexpected_disconnect(true, 5);
        assert!(policy.cancel());
        assert_eq!(policy.phase(), ReconnectPhase::GaveUp);
        assert_eq!(policy.tick(|_| {}), None);
        assert!(!policy.cancel());
    }

    #[test]
    fn test_fresh_episode_leaves_pending_countdown() {
        let mut policy = ReconnectPolicy::new();
        policy.on_unexpected_disconnect(true, 5);
        run_countdown(&mut policy);
        policy.on_unexpected_disconnect(true, 5);
        assert_eq!(policy.last_delay(), Some(Duration::from_secs(4)));

        policy.begin_fresh_episode();
        assert_eq!(policy.attempts(), 0);
        assert!(policy.is_counting_down());

        let (_, attempt) = run_countdown(&mut policy);
        assert_eq!(attempt, Some(ReconnectAttempt { attempt: 2, max: 5 }));
        assert_eq!(policy.attempts(), 2);
    }

    #[test]
    fn test_second_signal_during_countdown_is_ignored() {
        let mut policy = ReconnectPolicy::new();
        policy.on_unexpected_disconnect(true, 5);
        assert_eq!(policy.on_unexpected_disconnect(true, 5), None);
        let (_, attempt) = run_countdown(&mut policy);
        assert_eq!(attempt.map(|a| a.attempt), Some(1));
    }

    proptest! {
        #[test]
        fn prop_delay_is_capped_power_of_two(n in 1u32..=64) {
            let expected = if n <= 5 { 1u64 << n } else { 60 };
            prop_assert_eq!(reconnect_delay(n).as_secs(), expected.min(60));
        }

        #[test]
        fn prop_connected_always_resets(failures in 0u32..20, max in 1u32..10) {
            let mut policy = ReconnectPolicy::new();
            for _ in 0..failures {
                if policy.on_unexpected_disconnect(true, max).is_some() {
                    run_countdown(&mut policy);
                }
            }
            policy.on_connected();
            prop_assert_eq!(policy.attempts(), 0);
            prop_assert_eq!(policy.phase(), ReconnectPhase::Idle);
        }
    }
}
