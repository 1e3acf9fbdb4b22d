use std::time::{Duration, Instant};

/// What a response told us about the remote rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Throttled,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub base_wait: Duration,
    pub max_wait: Duration,
    /// How often a suspended caller re-checks whether the wait has elapsed.
    pub poll_interval: Duration,
}

impl RateLimitPolicy {
    /// Largest multiplier the backoff may reach: `max_wait / base_wait`, at least 1.
    pub fn multiplier_cap(&self) -> u32 {
        if self.base_wait.is_zero() {
            return 1;
        }
        let ratio = self.max_wait.as_millis() / self.base_wait.as_millis().max(1);
        u32::try_from(ratio).unwrap_or(u32::MAX).max(1)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            base_wait: Duration::from_secs(60),
            max_wait: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Throttling bookkeeping. Lives in memory only and starts fresh on restart.
///
/// The first throttling signal after a success waits `base_wait`; each further
/// signal without an intervening success doubles the multiplier up to
/// [`RateLimitPolicy::multiplier_cap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitState {
    policy: RateLimitPolicy,
    active: bool,
    last_triggered_at: Option<Instant>,
    multiplier: u32,
    throttled_streak: u32,
}

impl RateLimitState {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            active: false,
            last_triggered_at: None,
            multiplier: 1,
            throttled_streak: 0,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn last_triggered_at(&self) -> Option<Instant> {
        self.last_triggered_at
    }

    pub fn observe(&mut self, signal: Signal, now: Instant) {
        match signal {
            Signal::Throttled => {
                if self.throttled_streak > 0 {
                    self.multiplier = self
                        .multiplier
                        .saturating_mul(2)
                        .min(self.policy.multiplier_cap());
                }
                self.throttled_streak = self.throttled_streak.saturating_add(1);
                self.active = true;
                self.last_triggered_at = Some(now);
            }
            Signal::Success => {
                // The active flag and timer are left to `try_clear`.
                self.multiplier = 1;
                self.throttled_streak = 0;
            }
        }
    }

    /// `min(base_wait * multiplier, max_wait)`.
    pub fn effective_wait(&self) -> Duration {
        self.policy
            .base_wait
            .saturating_mul(self.multiplier)
            .min(self.policy.max_wait)
    }

    /// Time left before acting is safe again, or `None` if it already is.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        if !self.active {
            return None;
        }
        let triggered = self.last_triggered_at?;
        let elapsed = now.saturating_duration_since(triggered);
        let wait = self.effective_wait();
        (elapsed < wait).then(|| wait - elapsed)
    }

    /// Drops the active flag once the wait has elapsed. Returns true when the
    /// caller may proceed.
    pub fn try_clear(&mut self, now: Instant) -> bool {
        if self.remaining(now).is_some() {
            return false;
        }
        self.active = false;
        true
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}
