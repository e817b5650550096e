//! Brute-force protection through lockout after repeated failures
//!
//! - Failures 1-2: no lockout, the remaining count is reported
//! - Failure 3: lockout for the base duration (30 seconds), counter resets
//! - Subsequent triggers: base × (failures / threshold), capped at the ceiling
//!
//! Because the counter resets every time a lockout triggers, the multiplier
//! is 1 in practice and every lockout lasts the base duration. The policy
//! never persists anything; it lives for one session.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Failures that trigger a lockout
pub const DEFAULT_THRESHOLD: u32 = 3;

/// First lockout duration (seconds)
pub const DEFAULT_BASE_SECS: u64 = 30;

/// Longest lockout (seconds)
pub const DEFAULT_MAX_SECS: u64 = 10 * 60;

/// Base duration when the operator enabled debug exit (seconds)
pub const DEFAULT_DEBUG_BASE_SECS: u64 = 5;

/// Upper bound on any configured lockout (seconds)
pub const MAX_LOCKOUT_SECS: u64 = 24 * 60 * 60;

/// Lockout schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Consecutive failures before a lockout
    pub threshold: u32,
    /// Duration of the first lockout
    pub base_secs: u64,
    /// Ceiling for every lockout
    pub max_secs: u64,
    /// Base duration substituted in debug mode
    pub debug_base_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            base_secs: DEFAULT_BASE_SECS,
            max_secs: DEFAULT_MAX_SECS,
            debug_base_secs: DEFAULT_DEBUG_BASE_SECS,
        }
    }
}

impl LockoutConfig {
    /// Base duration, honouring debug mode
    pub fn base(&self, debug: bool) -> Duration {
        if debug {
            Duration::from_secs(self.debug_base_secs)
        } else {
            Duration::from_secs(self.base_secs)
        }
    }

    /// Lockout ceiling, never above [`MAX_LOCKOUT_SECS`]
    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.max_secs.min(MAX_LOCKOUT_SECS))
    }
}

/// Result of feeding one failure to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutOutcome {
    /// Whether this failure started a lockout
    pub activated: bool,
    /// Length of the new lockout (zero when not activated)
    pub duration: Duration,
    /// Failures left before a lockout (zero when activated)
    pub remaining_before_lockout: u32,
}

/// Lockout state machine
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    config: LockoutConfig,
    debug: bool,
    failed_count: u32,
    lockout_until: Option<Instant>,
    lockout_active: bool,
    last_failure: Option<Instant>,
    lockouts_triggered: u32,
}

impl LockoutPolicy {
    /// Create a policy with the given schedule
    pub fn new(config: LockoutConfig, debug: bool) -> Self {
        Self {
            config,
            debug,
            failed_count: 0,
            lockout_until: None,
            lockout_active: false,
            last_failure: None,
            lockouts_triggered: 0,
        }
    }

    /// Record a failed authentication at `now`
    pub fn on_failure(&mut self, now: Instant) -> LockoutOutcome {
        self.failed_count += 1;
        self.last_failure = Some(now);

        let threshold = self.config.threshold.max(1);
        if self.failed_count < threshold {
            return LockoutOutcome {
                activated: false,
                duration: Duration::ZERO,
                remaining_before_lockout: threshold - self.failed_count,
            };
        }

        let base = self.config.base(self.debug);
        let duration = if self.lockouts_triggered == 0 {
            base
        } else {
            base.saturating_mul(self.failed_count / threshold)
        }
        .min(self.config.ceiling());

        self.activate(now, duration)
    }

    /// Start the longest lockout immediately (backend reported the account locked)
    pub fn force_lockout(&mut self, now: Instant) -> LockoutOutcome {
        self.last_failure = Some(now);
        let ceiling = self.config.ceiling();
        self.activate(now, ceiling)
    }

    fn activate(&mut self, now: Instant, duration: Duration) -> LockoutOutcome {
        let duration = duration.min(Duration::from_secs(MAX_LOCKOUT_SECS));
        self.lockout_until = Some(now + duration);
        self.lockout_active = true;
        self.failed_count = 0;
        self.lockouts_triggered += 1;

        LockoutOutcome {
            activated: true,
            duration,
            remaining_before_lockout: 0,
        }
    }

    /// Whether attempts are refused at `now`. Clears an expired lockout.
    pub fn is_locked_out(&mut self, now: Instant) -> bool {
        if !self.lockout_active {
            return false;
        }

        match self.lockout_until {
            Some(until) if now < until => true,
            _ => {
                self.lockout_active = false;
                false
            }
        }
    }

    /// Time left in the current lockout (zero when none)
    pub fn remaining(&mut self, now: Instant) -> Duration {
        if !self.is_locked_out(now) {
            return Duration::ZERO;
        }
        self.lockout_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Remaining lockout time as MM:SS
    pub fn format_remaining(&mut self, now: Instant) -> String {
        format_countdown(self.remaining(now))
    }

    /// Forget every failure (successful authentication)
    pub fn reset(&mut self) {
        self.failed_count = 0;
        self.lockout_until = None;
        self.lockout_active = false;
        self.last_failure = None;
        self.lockouts_triggered = 0;
    }

    /// Failures since the last reset or lockout
    pub fn failed_count(&self) -> u32 {
        self.failed_count
    }

    /// Failures left before a lockout
    pub fn attempts_remaining(&self) -> u32 {
        self.config.threshold.saturating_sub(self.failed_count)
    }

    /// End of the most recent lockout. May be stale; use `is_locked_out`.
    pub fn lockout_until(&self) -> Option<Instant> {
        self.lockout_until
    }

    /// Time of the most recent failure
    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Lockouts started since the last reset
    pub fn lockouts_triggered(&self) -> u32 {
        self.lockouts_triggered
    }

    /// The schedule in use
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }
}

/// Format a duration as MM:SS
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
